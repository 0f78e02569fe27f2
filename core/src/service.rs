use std::path::Path;

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::MealPlanError;
use crate::importer::{
    self, ExtractedRecipe, ImportSummary, ImportedLine, RecipeExtractor, ResolvedLines,
};
use crate::models::{Ingredient, Meal, MealType, NewIngredient, NewMeal, Plan, UserContext};
use crate::pagination::{CollectionKind, Entity, Page, collect_all};
use crate::planner::{self, PlanView};

/// A meal entered by hand, with ingredients referenced by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealDraft {
    pub name: String,
    pub meal_type: MealType,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub default_servings: Option<f64>,
    #[serde(default)]
    pub ingredients: Vec<ImportedLine>,
}

pub struct MealPlanService {
    db: Database,
}

impl MealPlanService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    // --- Ingredients ---

    pub fn add_ingredient(&self, user: &UserContext, ingredient: &NewIngredient) -> Result<Ingredient> {
        self.db.insert_ingredient(user, ingredient)
    }

    pub fn delete_ingredient(&self, user: &UserContext, id: &str) -> Result<bool> {
        self.db.delete_ingredient(user, id)
    }

    // --- Meals ---

    pub fn add_meal(&self, user: &UserContext, draft: &MealDraft) -> Result<Meal> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(MealPlanError::validation("Meal name must not be empty").into());
        }
        if let Some(servings) = draft.default_servings {
            if !(servings.is_finite() && servings > 0.0) {
                return Err(MealPlanError::validation("Servings must be greater than 0").into());
            }
        }
        let ResolvedLines { lines, .. } = importer::resolve_lines(&self.db, user, &draft.ingredients)?;
        let meal = NewMeal {
            name: name.to_string(),
            instructions: draft.instructions.clone(),
            default_servings: draft.default_servings,
            meal_type: draft.meal_type,
            ingredient_lines: lines,
            url: None,
            servings_imported: None,
            macros: None,
        };
        self.db.insert_meal(user, &meal)
    }

    pub fn get_meal(&self, user: &UserContext, id: &str) -> Result<Meal> {
        self.db.get_meal(user, id)
    }

    pub fn delete_meal(&self, user: &UserContext, id: &str) -> Result<bool> {
        self.db.delete_meal(user, id)
    }

    /// Every meal the user owns, fetched page by page.
    pub fn load_all_meals(&self, user: &UserContext) -> Result<Vec<Meal>> {
        collect_all(CollectionKind::Meals.default_page_size(), |size, cursor| {
            self.db.list_meals_page(user, size, cursor)
        })
    }

    // --- Import ---

    /// Extract a recipe from `url` and save it as a meal. Nothing is written
    /// when the URL is blank or extraction fails.
    pub fn import_recipe(
        &self,
        extractor: &dyn RecipeExtractor,
        user: &UserContext,
        url: &str,
        meal_type: MealType,
    ) -> Result<ImportSummary> {
        let url = importer::validate_recipe_url(url)?;
        let recipe = extractor.extract(url)?;
        self.persist_extracted_recipe(user, url, meal_type, &recipe)
    }

    /// Second half of an import, for callers that ran extraction themselves.
    pub fn persist_extracted_recipe(
        &self,
        user: &UserContext,
        url: &str,
        meal_type: MealType,
        recipe: &ExtractedRecipe,
    ) -> Result<ImportSummary> {
        importer::persist_recipe(&self.db, user, url, meal_type, recipe)
    }

    // --- Plans ---

    /// Generate a plan from all of the user's meals and save it.
    pub fn generate_and_save_plan<R: Rng + ?Sized>(
        &self,
        user: &UserContext,
        start_date: &str,
        num_days: u32,
        rng: &mut R,
    ) -> Result<Plan> {
        let start = planner::parse_start_date(start_date)?;
        crate::models::validate_num_days(num_days)?;
        let meals = self.load_all_meals(user)?;
        let new_plan = planner::generate_plan(start, num_days, &meals, rng)?;
        self.db.insert_plan(user, &new_plan)
    }

    pub fn get_plan(&self, user: &UserContext, id: &str) -> Result<Plan> {
        self.db.get_plan(user, id)
    }

    pub fn delete_plan(&self, user: &UserContext, id: &str) -> Result<bool> {
        self.db.delete_plan(user, id)
    }

    pub fn plan_view(&self, user: &UserContext, id: &str) -> Result<PlanView> {
        let plan = self.db.get_plan(user, id)?;
        let names = self.db.meal_names(user)?;
        Ok(planner::build_plan_view(&plan, &names))
    }

    // --- Paging ---

    pub fn fetch_page(
        &self,
        kind: CollectionKind,
        user: &UserContext,
        page_size: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<Page<Entity>> {
        self.db.fetch_page(kind, user, page_size, cursor)
    }

    pub fn list_ingredients_page(
        &self,
        user: &UserContext,
        page_size: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<Page<Ingredient>> {
        let size = page_size.unwrap_or_else(|| CollectionKind::Ingredients.default_page_size());
        self.db.list_ingredients_page(user, size, cursor)
    }

    pub fn list_meals_page(
        &self,
        user: &UserContext,
        page_size: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<Page<Meal>> {
        let size = page_size.unwrap_or_else(|| CollectionKind::Meals.default_page_size());
        self.db.list_meals_page(user, size, cursor)
    }

    pub fn list_plans_page(
        &self,
        user: &UserContext,
        page_size: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<Page<Plan>> {
        let size = page_size.unwrap_or_else(|| CollectionKind::Plans.default_page_size());
        self.db.list_plans_page(user, size, cursor)
    }
}
