//! Mapping from a recipe extraction response to a stored meal.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::MealPlanError;
use crate::models::{IngredientLine, Meal, MealType, NewMeal, UserContext};
use crate::units::DEFAULT_UNIT;

/// Something that can turn a recipe page URL into structured recipe data.
///
/// The CLI implements this over reqwest; tests use canned responses.
pub trait RecipeExtractor: Send + Sync {
    fn extract(&self, url: &str) -> Result<ExtractedRecipe>;
}

/// Response body of the recipe extraction endpoint. Every field is optional;
/// the service omits whatever it could not find on the page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecipe {
    pub status: Option<String>,
    pub message: Option<String>,
    pub title: Option<String>,
    pub servings: Option<serde_json::Value>,
    pub instructions: Option<String>,
    pub summary: Option<String>,
    pub extended_ingredients: Option<Vec<ExtractedIngredient>>,
    pub nutrition: Option<ExtractedNutrition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIngredient {
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub amount: Option<serde_json::Value>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedNutrition {
    pub nutrients: Option<Vec<ExtractedNutrient>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedNutrient {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub unit: Option<String>,
}

/// One ingredient line by name, before it is tied to a stored ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedLine {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

/// What an import did.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub meal: Meal,
    pub ingredients_created: usize,
    pub ingredients_reused: usize,
    pub lines_skipped: usize,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

impl ExtractedRecipe {
    /// Fail when the service reported `status: "failure"` in a 2xx body.
    pub fn check_status(&self) -> Result<(), MealPlanError> {
        if self.status.as_deref() == Some("failure") {
            let message = non_empty(self.message.as_deref()).unwrap_or("Recipe API failure");
            return Err(MealPlanError::extraction(message));
        }
        Ok(())
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.title.clone().unwrap_or_default()
    }

    /// Instructions, then the summary, then nothing.
    #[must_use]
    pub fn instructions_text(&self) -> String {
        non_empty(self.instructions.as_deref())
            .or_else(|| non_empty(self.summary.as_deref()))
            .unwrap_or_default()
            .to_string()
    }

    /// Servings as a number; missing, zero or unparseable is 1.
    #[must_use]
    pub fn servings(&self) -> f64 {
        let parsed = match &self.servings {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|s| s.is_finite() && *s != 0.0).unwrap_or(1.0)
    }

    /// Nutrients as `"name: amountunit"` joined by `", "`.
    #[must_use]
    pub fn macros(&self) -> String {
        let Some(nutrients) = self.nutrition.as_ref().and_then(|n| n.nutrients.as_ref()) else {
            return String::new();
        };
        nutrients
            .iter()
            .map(|n| {
                let amount = n.amount.map(|a| a.to_string()).unwrap_or_default();
                format!(
                    "{}: {}{}",
                    n.name.as_deref().unwrap_or_default(),
                    amount,
                    n.unit.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[must_use]
    pub fn ingredient_lines(&self) -> Vec<ImportedLine> {
        self.extended_ingredients
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(map_ingredient)
            .collect()
    }
}

fn map_ingredient(ing: &ExtractedIngredient) -> ImportedLine {
    let name = non_empty(ing.name.as_deref())
        .or_else(|| non_empty(ing.original_name.as_deref()))
        .unwrap_or_default()
        .to_string();
    let quantity = match &ing.amount {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    };
    let unit = non_empty(ing.unit.as_deref())
        .unwrap_or(DEFAULT_UNIT)
        .to_lowercase();
    ImportedLine {
        name,
        quantity,
        unit,
    }
}

/// Trimmed URL, or a validation error when there is nothing to fetch.
pub fn validate_recipe_url(url: &str) -> Result<&str, MealPlanError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(MealPlanError::validation("Recipe URL is required"));
    }
    Ok(url)
}

/// Ingredient lines tied to stored ingredients, with counts of what happened.
#[derive(Debug, Clone, Default)]
pub struct ResolvedLines {
    pub lines: Vec<IngredientLine>,
    pub created: usize,
    pub reused: usize,
    pub skipped: usize,
}

/// Resolve each named line to an ingredient, creating missing ones. Lines
/// without a name are skipped. A zero quantity becomes 1 and the stored
/// ingredient's unit wins over the line's own.
pub fn resolve_lines(
    db: &Database,
    user: &UserContext,
    named: &[ImportedLine],
) -> Result<ResolvedLines> {
    let mut resolved = ResolvedLines::default();
    for line in named {
        if line.name.trim().is_empty() {
            tracing::warn!(quantity = line.quantity, unit = %line.unit, "skipping ingredient line without a name");
            resolved.skipped += 1;
            continue;
        }
        let fallback_unit = if line.unit.trim().is_empty() {
            DEFAULT_UNIT
        } else {
            line.unit.as_str()
        };
        let (ingredient, was_created) = db.ensure_ingredient_by_name(user, &line.name, fallback_unit)?;
        if was_created {
            resolved.created += 1;
        } else {
            resolved.reused += 1;
        }

        let quantity = if line.quantity == 0.0 || line.quantity.is_nan() {
            1.0
        } else {
            line.quantity
        };
        let unit = [ingredient.unit.as_str(), line.unit.as_str()]
            .into_iter()
            .find(|u| !u.is_empty())
            .unwrap_or(DEFAULT_UNIT)
            .to_string();
        resolved.lines.push(IngredientLine {
            ingredient_id: ingredient.id,
            quantity,
            unit,
        });
    }
    Ok(resolved)
}

/// Resolve every line of an extracted recipe and save it as a meal.
/// Ingredients created before a failed meal insert stay in place.
pub fn persist_recipe(
    db: &Database,
    user: &UserContext,
    url: &str,
    meal_type: MealType,
    recipe: &ExtractedRecipe,
) -> Result<ImportSummary> {
    recipe.check_status()?;

    let ResolvedLines {
        lines,
        created,
        reused,
        skipped,
    } = resolve_lines(db, user, &recipe.ingredient_lines())?;

    let servings = recipe.servings();
    let new_meal = NewMeal {
        name: recipe.title(),
        instructions: recipe.instructions_text(),
        default_servings: Some(servings),
        meal_type,
        ingredient_lines: lines,
        url: Some(url.to_string()),
        servings_imported: Some(servings),
        macros: Some(recipe.macros()),
    };
    let meal = db.insert_meal(user, &new_meal)?;

    tracing::info!(
        meal_id = %meal.id,
        created,
        reused,
        skipped,
        "imported recipe"
    );

    Ok(ImportSummary {
        meal,
        ingredients_created: created,
        ingredients_reused: reused,
        lines_skipped: skipped,
    })
}
