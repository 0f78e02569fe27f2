use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MealPlanError;

/// The signed-in user every store operation is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub display_name: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    LunchDinner,
    Snack,
}

impl MealType {
    /// Plan slots in generation order.
    pub const ALL: [MealType; 3] = [Self::Breakfast, Self::LunchDinner, Self::Snack];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::LunchDinner => "lunch_dinner",
            Self::Snack => "snack",
        }
    }

    /// Heading shown for the slot in plan views.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::LunchDinner => "Dinner",
            Self::Snack => "Snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = MealPlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "lunch_dinner" | "lunch-dinner" | "lunch" | "dinner" => Ok(Self::LunchDinner),
            "snack" => Ok(Self::Snack),
            _ => Err(MealPlanError::validation(format!(
                "Invalid meal type '{s}'. Must be one of: breakfast, lunch_dinner, snack"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    pub name_lower: String,
    pub unit: String,
    pub amount: f64,
    pub servings: f64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub unit: String,
    pub amount: Option<f64>,
    pub servings: Option<f64>,
}

impl NewIngredient {
    pub fn named(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            amount: None,
            servings: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub ingredient_id: String,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    pub id: String,
    pub name: String,
    pub instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_servings: Option<f64>,
    pub meal_type: MealType,
    pub ingredient_lines: Vec<IngredientLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings_imported: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<String>,
    pub created_at: String,
}

impl Meal {
    /// Servings a plan entry gets for this meal: the default, or 1 when it
    /// is missing, zero or NaN.
    #[must_use]
    pub fn plan_servings(&self) -> f64 {
        self.default_servings
            .filter(|s| *s != 0.0 && !s.is_nan())
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub name: String,
    pub instructions: String,
    pub default_servings: Option<f64>,
    pub meal_type: MealType,
    pub ingredient_lines: Vec<IngredientLine>,
    pub url: Option<String>,
    pub servings_imported: Option<f64>,
    pub macros: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub date: String,
    pub slot: MealType,
    pub meal_id: String,
    pub servings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub start_date: String,
    pub num_days: u32,
    pub entries: Vec<PlanEntry>,
    pub created_at: String,
}

/// A generated plan that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPlan {
    pub start_date: String,
    pub num_days: u32,
    pub entries: Vec<PlanEntry>,
}

pub const MIN_PLAN_DAYS: u32 = 1;
pub const MAX_PLAN_DAYS: u32 = 28;

pub fn validate_num_days(num_days: u32) -> Result<u32, MealPlanError> {
    if (MIN_PLAN_DAYS..=MAX_PLAN_DAYS).contains(&num_days) {
        Ok(num_days)
    } else {
        Err(MealPlanError::validation(format!(
            "Number of days must be between {MIN_PLAN_DAYS} and {MAX_PLAN_DAYS} (got {num_days})"
        )))
    }
}

/// Case-insensitive lookup key for ingredient names.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
