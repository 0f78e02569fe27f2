use anyhow::Result;

use crate::config::Config;

use super::helpers::exit_not_found;

pub(crate) fn cmd_auth_login(
    config: &Config,
    name: &str,
    user_id: Option<&str>,
    json: bool,
) -> Result<()> {
    let user = config.login(name, user_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        let display_name = &user.display_name;
        let id = &user.user_id;
        println!("Logged in as {display_name} (user id: {id})");
    }
    Ok(())
}

pub(crate) fn cmd_auth_whoami(config: &Config, json: bool) -> Result<()> {
    let Some(user) = config.load_session()? else {
        exit_not_found("Not logged in", json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        let display_name = &user.display_name;
        let id = &user.user_id;
        println!("{display_name} (user id: {id})");
    }
    Ok(())
}

pub(crate) fn cmd_auth_logout(config: &Config, json: bool) -> Result<()> {
    let was_logged_in = config.logout()?;
    if json {
        println!("{}", serde_json::json!({ "logged_out": was_logged_in }));
    } else if was_logged_in {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}
