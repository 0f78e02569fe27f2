use anyhow::{Context, Result};

use mealplan_core::error::MealPlanError;
use mealplan_core::importer::{ExtractedRecipe, RecipeExtractor};

const EXTRACT_URL: &str = "https://api.spoonacular.com/recipes/extract";

pub struct SpoonacularClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    rt: tokio::runtime::Handle,
}

impl SpoonacularClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "mealplan-cli/{} (meal planner)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(20))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: EXTRACT_URL.to_string(),
            rt: tokio::runtime::Handle::current(),
        })
    }

    /// Point the client at a different extraction endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn extract_async(&self, url: &str) -> Result<ExtractedRecipe> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("apiKey", self.api_key.as_str()), ("url", url)])
            .send()
            .await
            .map_err(|e| {
                // The request URL carries the API key
                MealPlanError::extraction(format!(
                    "Failed to reach Spoonacular API: {}",
                    e.without_url()
                ))
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "recipe extraction request failed");
            return Err(MealPlanError::extraction(format!(
                "Recipe API error: {}",
                status.as_u16()
            ))
            .into());
        }

        let recipe: ExtractedRecipe = resp
            .json()
            .await
            .context("Failed to parse Spoonacular extract response")?;
        recipe.check_status()?;
        Ok(recipe)
    }
}

impl RecipeExtractor for SpoonacularClient {
    /// Blocks on the async request. Call from outside the runtime or inside
    /// `tokio::task::block_in_place`.
    fn extract(&self, url: &str) -> Result<ExtractedRecipe> {
        self.rt.block_on(self.extract_async(url))
    }
}
