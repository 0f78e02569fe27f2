use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

use mealplan_core::models::UserContext;

pub const SPOONACULAR_KEY_ENV: &str = "SPOONACULAR_API_KEY";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

/// The signed-in profile, persisted as `profile.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    user_id: String,
    display_name: String,
    created_at: String,
}

fn random_hex(len_bytes: usize) -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    (0..len_bytes).fold(String::with_capacity(len_bytes * 2), |mut acc, _| {
        let b: u8 = rng.random();
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "mealplan").context("Could not determine home directory")?;
        Self::from_data_dir(proj_dirs.data_dir().to_path_buf())
    }

    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("mealplan.db");

        Ok(Config { db_path, data_dir })
    }

    fn profile_path(&self) -> PathBuf {
        self.data_dir.join("profile.json")
    }

    /// The current session, or `None` when logged out.
    pub fn load_session(&self) -> Result<Option<UserContext>> {
        let path = self.profile_path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).context("Failed to read profile")?;
        let profile: Profile = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt profile file: {}", path.display()))?;
        Ok(Some(UserContext::new(profile.user_id, profile.display_name)))
    }

    /// The current session, or an error telling the user to log in.
    pub fn require_session(&self) -> Result<UserContext> {
        match self.load_session()? {
            Some(user) => Ok(user),
            None => bail!("Not logged in. Run: mealplan auth login <name>"),
        }
    }

    /// Start a session. An existing profile keeps its user id so data
    /// stays attached across logins; `user_id` overrides it.
    pub fn login(&self, display_name: &str, user_id: Option<&str>) -> Result<UserContext> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            bail!("Display name must not be empty");
        }
        let user_id = match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => match self.load_session()? {
                Some(existing) => existing.user_id,
                None => random_hex(16),
            },
        };
        let profile = Profile {
            user_id: user_id.clone(),
            display_name: display_name.to_string(),
            created_at: chrono::Local::now().to_rfc3339(),
        };
        let path = self.profile_path();
        std::fs::write(&path, serde_json::to_string_pretty(&profile)?)
            .context("Failed to write profile")?;
        restrict_permissions(&path)?;
        tracing::debug!(user = %user_id, "logged in");
        Ok(UserContext::new(user_id, display_name))
    }

    /// End the session. Returns false when nobody was logged in.
    pub fn logout(&self) -> Result<bool> {
        let path = self.profile_path();
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).context("Failed to remove profile")?;
        Ok(true)
    }

    /// Spoonacular key from the environment, then from `spoonacular_key` in
    /// the data directory.
    pub fn spoonacular_api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var(SPOONACULAR_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }
        let path = self.data_dir.join("spoonacular_key");
        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read Spoonacular key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }
        bail!(
            "Missing Spoonacular API key. Set {SPOONACULAR_KEY_ENV} or write it to {}",
            path.display()
        )
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let key = random_hex(32);
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        restrict_permissions(&path)?;
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_data_dir(dir.path().join("data")).unwrap();
        (dir, config)
    }

    #[test]
    fn test_logged_out_by_default() {
        let (_dir, config) = temp_config();
        assert!(config.load_session().unwrap().is_none());
        assert!(config.require_session().is_err());
        assert!(!config.logout().unwrap());
    }

    #[test]
    fn test_login_whoami_logout() {
        let (_dir, config) = temp_config();
        let user = config.login("Sam", None).unwrap();
        assert_eq!(user.display_name, "Sam");
        assert_eq!(user.user_id.len(), 32);

        let loaded = config.require_session().unwrap();
        assert_eq!(loaded, user);

        assert!(config.logout().unwrap());
        assert!(config.load_session().unwrap().is_none());
    }

    #[test]
    fn test_relogin_keeps_user_id() {
        let (_dir, config) = temp_config();
        let first = config.login("Sam", None).unwrap();
        let second = config.login("Samantha", None).unwrap();
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(second.display_name, "Samantha");

        let explicit = config.login("Sam", Some("shared-id")).unwrap();
        assert_eq!(explicit.user_id, "shared-id");
    }

    #[test]
    fn test_login_rejects_blank_name() {
        let (_dir, config) = temp_config();
        assert!(config.login("  ", None).is_err());
    }

    #[test]
    fn test_api_key_created_once() {
        let (_dir, config) = temp_config();
        let (key, created) = config.load_or_create_api_key().unwrap();
        assert!(created);
        assert_eq!(key.len(), 64);
        let (again, created) = config.load_or_create_api_key().unwrap();
        assert!(!created);
        assert_eq!(again, key);
    }

    #[test]
    fn test_spoonacular_key_from_file() {
        let (_dir, config) = temp_config();
        // Only meaningful when the variable is unset in the test environment
        if std::env::var(SPOONACULAR_KEY_ENV).is_ok() {
            return;
        }
        assert!(config.spoonacular_api_key().is_err());
        std::fs::write(config.data_dir.join("spoonacular_key"), "abc123\n").unwrap();
        assert_eq!(config.spoonacular_api_key().unwrap(), "abc123");
    }
}
