use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use uuid::Uuid;

use crate::error::MealPlanError;
use crate::models::{
    Ingredient, IngredientLine, Meal, MealType, NewIngredient, NewMeal, NewPlan, Plan, PlanEntry,
    UserContext, normalize_name,
};
use crate::pagination::{CollectionKind, Cursor, Entity, Page, validate_page_size};
use crate::units::normalize_unit;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS ingredients (
                    id TEXT PRIMARY KEY NOT NULL,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    name_lower TEXT NOT NULL,
                    unit TEXT NOT NULL DEFAULT 'pc',
                    amount REAL NOT NULL DEFAULT 1,
                    servings REAL NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    UNIQUE (user_id, name_lower)
                );
                CREATE INDEX IF NOT EXISTS idx_ingredients_user_name
                    ON ingredients (user_id, name, id);

                CREATE TABLE IF NOT EXISTS meals (
                    id TEXT PRIMARY KEY NOT NULL,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    instructions TEXT NOT NULL DEFAULT '',
                    default_servings REAL,
                    meal_type TEXT NOT NULL
                        CHECK (meal_type IN ('breakfast', 'lunch_dinner', 'snack')),
                    url TEXT,
                    servings_imported REAL,
                    macros TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_meals_user_name
                    ON meals (user_id, name, id);

                -- ingredient_id is a weak reference: deleting an ingredient
                -- leaves the line in place.
                CREATE TABLE IF NOT EXISTS meal_ingredient_lines (
                    meal_id TEXT NOT NULL REFERENCES meals(id),
                    position INTEGER NOT NULL,
                    ingredient_id TEXT NOT NULL,
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL,
                    PRIMARY KEY (meal_id, position)
                );

                CREATE TABLE IF NOT EXISTS plans (
                    id TEXT PRIMARY KEY NOT NULL,
                    user_id TEXT NOT NULL,
                    start_date TEXT NOT NULL,
                    num_days INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_plans_user_start
                    ON plans (user_id, start_date, id);

                -- meal_id is a weak reference: plans outlive the meals they name.
                CREATE TABLE IF NOT EXISTS plan_entries (
                    plan_id TEXT NOT NULL REFERENCES plans(id),
                    position INTEGER NOT NULL,
                    date TEXT NOT NULL,
                    slot TEXT NOT NULL,
                    meal_id TEXT NOT NULL,
                    servings REAL NOT NULL,
                    PRIMARY KEY (plan_id, position),
                    UNIQUE (plan_id, date, slot)
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn meal_type_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<MealType> {
        let raw: String = row.get(idx)?;
        raw.parse()
            .map_err(|e: MealPlanError| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    // Expects columns:
    // 0: id, 1: name, 2: name_lower, 3: unit, 4: amount, 5: servings, 6: created_at
    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            name: row.get(1)?,
            name_lower: row.get(2)?,
            unit: row.get(3)?,
            amount: row.get(4)?,
            servings: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    // Expects columns:
    // 0: id, 1: name, 2: instructions, 3: default_servings, 4: meal_type,
    // 5: url, 6: servings_imported, 7: macros, 8: created_at
    // Lines are filled in separately.
    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
        Ok(Meal {
            id: row.get(0)?,
            name: row.get(1)?,
            instructions: row.get(2)?,
            default_servings: row.get(3)?,
            meal_type: Self::meal_type_column(row, 4)?,
            ingredient_lines: Vec::new(),
            url: row.get(5)?,
            servings_imported: row.get(6)?,
            macros: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    // Expects columns: 0: id, 1: start_date, 2: num_days, 3: created_at
    // Entries are filled in separately.
    fn plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<Plan> {
        Ok(Plan {
            id: row.get(0)?,
            start_date: row.get(1)?,
            num_days: row.get(2)?,
            entries: Vec::new(),
            created_at: row.get(3)?,
        })
    }

    fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
        )
    }

    // --- Ingredients ---

    pub fn insert_ingredient(&self, user: &UserContext, ingredient: &NewIngredient) -> Result<Ingredient> {
        let name = ingredient.name.trim();
        let name_lower = normalize_name(name);
        if name_lower.is_empty() {
            return Err(MealPlanError::validation("Ingredient name must not be empty").into());
        }
        let unit = normalize_unit(&ingredient.unit);
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        let result = self.conn.execute(
            "INSERT INTO ingredients (id, user_id, name, name_lower, unit, amount, servings, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                user.user_id,
                name,
                name_lower,
                unit,
                ingredient.amount.unwrap_or(1.0),
                ingredient.servings.unwrap_or(1.0),
                now,
            ],
        );
        match result {
            Ok(_) => self.get_ingredient(user, &id),
            Err(e) if Self::is_constraint_violation(&e) => Err(MealPlanError::validation(format!(
                "Ingredient '{name}' already exists"
            ))
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_ingredient(&self, user: &UserContext, id: &str) -> Result<Ingredient> {
        self.conn
            .query_row(
                "SELECT id, name, name_lower, unit, amount, servings, created_at
                 FROM ingredients WHERE user_id = ?1 AND id = ?2",
                params![user.user_id, id],
                Self::ingredient_from_row,
            )
            .optional()?
            .ok_or_else(|| MealPlanError::not_found(format!("Ingredient {id} not found")).into())
    }

    /// Case-insensitive lookup by name. Blank names never match.
    pub fn find_ingredient_by_name(&self, user: &UserContext, name: &str) -> Result<Option<Ingredient>> {
        let name_lower = normalize_name(name);
        if name_lower.is_empty() {
            return Ok(None);
        }
        let ingredient = self
            .conn
            .query_row(
                "SELECT id, name, name_lower, unit, amount, servings, created_at
                 FROM ingredients WHERE user_id = ?1 AND name_lower = ?2
                 LIMIT 1",
                params![user.user_id, name_lower],
                Self::ingredient_from_row,
            )
            .optional()?;
        Ok(ingredient)
    }

    /// Find an ingredient by case-insensitive name, creating it with
    /// `unit_fallback` if missing. The insert and the uniqueness check are a
    /// single statement, so two concurrent callers end up with one row.
    ///
    /// Returns the ingredient and whether this call created it.
    pub fn ensure_ingredient_by_name(
        &self,
        user: &UserContext,
        name: &str,
        unit_fallback: &str,
    ) -> Result<(Ingredient, bool)> {
        let name = name.trim();
        let name_lower = normalize_name(name);
        if name_lower.is_empty() {
            return Err(MealPlanError::validation("Ingredient name must not be empty").into());
        }
        let now = Local::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO ingredients (id, user_id, name, name_lower, unit, amount, servings, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, 1, ?6)
             ON CONFLICT (user_id, name_lower) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                user.user_id,
                name,
                name_lower,
                normalize_unit(unit_fallback),
                now,
            ],
        )?;
        let ingredient = self
            .find_ingredient_by_name(user, name)?
            .with_context(|| format!("Ingredient '{name}' vanished after insert"))?;
        Ok((ingredient, inserted > 0))
    }

    pub fn delete_ingredient(&self, user: &UserContext, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM ingredients WHERE user_id = ?1 AND id = ?2",
            params![user.user_id, id],
        )?;
        Ok(rows > 0)
    }

    pub fn list_ingredients_page(
        &self,
        user: &UserContext,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<Ingredient>> {
        let page_size = validate_page_size(page_size)?;
        let after = cursor.map(Cursor::decode).transpose()?;
        let mut stmt = self.conn.prepare(
            "SELECT id, name, name_lower, unit, amount, servings, created_at
             FROM ingredients
             WHERE user_id = ?1 AND (?2 IS NULL OR name > ?2 OR (name = ?2 AND id > ?3))
             ORDER BY name, id
             LIMIT ?4",
        )?;
        let items = stmt
            .query_map(
                params![
                    user.user_id,
                    after.as_ref().map(|c| c.sort_key.as_str()),
                    after.as_ref().map(|c| c.id.as_str()),
                    i64::from(page_size),
                ],
                Self::ingredient_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(user = %user.user_id, count = items.len(), "fetched ingredients page");
        Ok(Page::from_rows(items, page_size, |i| Cursor::new(&i.name, &i.id)))
    }

    // --- Meals ---

    pub fn insert_meal(&self, user: &UserContext, meal: &NewMeal) -> Result<Meal> {
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO meals (id, user_id, name, instructions, default_servings, meal_type, url, servings_imported, macros, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                user.user_id,
                meal.name,
                meal.instructions,
                meal.default_servings,
                meal.meal_type.as_str(),
                meal.url,
                meal.servings_imported,
                meal.macros,
                now,
            ],
        )?;
        for (position, line) in meal.ingredient_lines.iter().enumerate() {
            tx.execute(
                "INSERT INTO meal_ingredient_lines (meal_id, position, ingredient_id, quantity, unit)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, position as i64, line.ingredient_id, line.quantity, line.unit],
            )?;
        }
        tx.commit()?;
        self.get_meal(user, &id)
    }

    fn get_meal_lines(&self, meal_id: &str) -> Result<Vec<IngredientLine>> {
        let mut stmt = self.conn.prepare(
            "SELECT ingredient_id, quantity, unit FROM meal_ingredient_lines
             WHERE meal_id = ?1 ORDER BY position",
        )?;
        let lines = stmt
            .query_map(params![meal_id], |row| {
                Ok(IngredientLine {
                    ingredient_id: row.get(0)?,
                    quantity: row.get(1)?,
                    unit: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    pub fn get_meal(&self, user: &UserContext, id: &str) -> Result<Meal> {
        let meal = self
            .conn
            .query_row(
                "SELECT id, name, instructions, default_servings, meal_type, url, servings_imported, macros, created_at
                 FROM meals WHERE user_id = ?1 AND id = ?2",
                params![user.user_id, id],
                Self::meal_from_row,
            )
            .optional()?;
        let mut meal =
            meal.ok_or_else(|| MealPlanError::not_found(format!("Meal {id} not found")))?;
        meal.ingredient_lines = self.get_meal_lines(&meal.id)?;
        Ok(meal)
    }

    /// Delete a meal and its ingredient lines. Plans that reference it are
    /// left alone.
    pub fn delete_meal(&self, user: &UserContext, id: &str) -> Result<bool> {
        let owned: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM meals WHERE user_id = ?1 AND id = ?2",
                params![user.user_id, id],
                |row| row.get(0),
            )
            .optional()?;
        if owned.is_none() {
            return Ok(false);
        }
        self.conn.execute(
            "DELETE FROM meal_ingredient_lines WHERE meal_id = ?1",
            params![id],
        )?;
        let rows = self.conn.execute(
            "DELETE FROM meals WHERE user_id = ?1 AND id = ?2",
            params![user.user_id, id],
        )?;
        Ok(rows > 0)
    }

    pub fn list_meals_page(
        &self,
        user: &UserContext,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<Meal>> {
        let page_size = validate_page_size(page_size)?;
        let after = cursor.map(Cursor::decode).transpose()?;
        let mut stmt = self.conn.prepare(
            "SELECT id, name, instructions, default_servings, meal_type, url, servings_imported, macros, created_at
             FROM meals
             WHERE user_id = ?1 AND (?2 IS NULL OR name > ?2 OR (name = ?2 AND id > ?3))
             ORDER BY name, id
             LIMIT ?4",
        )?;
        let mut items = stmt
            .query_map(
                params![
                    user.user_id,
                    after.as_ref().map(|c| c.sort_key.as_str()),
                    after.as_ref().map(|c| c.id.as_str()),
                    i64::from(page_size),
                ],
                Self::meal_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        for meal in &mut items {
            meal.ingredient_lines = self.get_meal_lines(&meal.id)?;
        }
        tracing::debug!(user = %user.user_id, count = items.len(), "fetched meals page");
        Ok(Page::from_rows(items, page_size, |m| Cursor::new(&m.name, &m.id)))
    }

    /// Meal id to name for every meal the user owns.
    pub fn meal_names(&self, user: &UserContext) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM meals WHERE user_id = ?1")?;
        let names = stmt
            .query_map(params![user.user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(names)
    }

    // --- Plans ---

    pub fn insert_plan(&self, user: &UserContext, plan: &NewPlan) -> Result<Plan> {
        let id = Uuid::new_v4().to_string();
        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO plans (id, user_id, start_date, num_days, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user.user_id, plan.start_date, plan.num_days, now],
        )?;
        for (position, entry) in plan.entries.iter().enumerate() {
            tx.execute(
                "INSERT INTO plan_entries (plan_id, position, date, slot, meal_id, servings)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    position as i64,
                    entry.date,
                    entry.slot.as_str(),
                    entry.meal_id,
                    entry.servings,
                ],
            )?;
        }
        tx.commit()?;
        self.get_plan(user, &id)
    }

    fn get_plan_entries(&self, plan_id: &str) -> Result<Vec<PlanEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, slot, meal_id, servings FROM plan_entries
             WHERE plan_id = ?1 ORDER BY position",
        )?;
        let entries = stmt
            .query_map(params![plan_id], |row| {
                Ok(PlanEntry {
                    date: row.get(0)?,
                    slot: Self::meal_type_column(row, 1)?,
                    meal_id: row.get(2)?,
                    servings: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn get_plan(&self, user: &UserContext, id: &str) -> Result<Plan> {
        let plan = self
            .conn
            .query_row(
                "SELECT id, start_date, num_days, created_at
                 FROM plans WHERE user_id = ?1 AND id = ?2",
                params![user.user_id, id],
                Self::plan_from_row,
            )
            .optional()?;
        let mut plan =
            plan.ok_or_else(|| MealPlanError::not_found(format!("Plan {id} not found")))?;
        plan.entries = self.get_plan_entries(&plan.id)?;
        Ok(plan)
    }

    pub fn delete_plan(&self, user: &UserContext, id: &str) -> Result<bool> {
        let owned: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM plans WHERE user_id = ?1 AND id = ?2",
                params![user.user_id, id],
                |row| row.get(0),
            )
            .optional()?;
        if owned.is_none() {
            return Ok(false);
        }
        self.conn
            .execute("DELETE FROM plan_entries WHERE plan_id = ?1", params![id])?;
        let rows = self.conn.execute(
            "DELETE FROM plans WHERE user_id = ?1 AND id = ?2",
            params![user.user_id, id],
        )?;
        Ok(rows > 0)
    }

    pub fn list_plans_page(
        &self,
        user: &UserContext,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<Page<Plan>> {
        let page_size = validate_page_size(page_size)?;
        let after = cursor.map(Cursor::decode).transpose()?;
        let mut stmt = self.conn.prepare(
            "SELECT id, start_date, num_days, created_at
             FROM plans
             WHERE user_id = ?1 AND (?2 IS NULL OR start_date > ?2 OR (start_date = ?2 AND id > ?3))
             ORDER BY start_date, id
             LIMIT ?4",
        )?;
        let mut items = stmt
            .query_map(
                params![
                    user.user_id,
                    after.as_ref().map(|c| c.sort_key.as_str()),
                    after.as_ref().map(|c| c.id.as_str()),
                    i64::from(page_size),
                ],
                Self::plan_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        for plan in &mut items {
            plan.entries = self.get_plan_entries(&plan.id)?;
        }
        tracing::debug!(user = %user.user_id, count = items.len(), "fetched plans page");
        Ok(Page::from_rows(items, page_size, |p| Cursor::new(&p.start_date, &p.id)))
    }

    // --- Generic paging ---

    /// Fetch one page of any collection. `page_size` falls back to the
    /// collection's default.
    pub fn fetch_page(
        &self,
        kind: CollectionKind,
        user: &UserContext,
        page_size: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<Page<Entity>> {
        let page_size = page_size.unwrap_or_else(|| kind.default_page_size());
        let page = match kind {
            CollectionKind::Ingredients => self
                .list_ingredients_page(user, page_size, cursor)?
                .map(Entity::Ingredient),
            CollectionKind::Meals => self
                .list_meals_page(user, page_size, cursor)?
                .map(Entity::Meal),
            CollectionKind::Plans => self
                .list_plans_page(user, page_size, cursor)?
                .map(Entity::Plan),
        };
        Ok(page)
    }
}
