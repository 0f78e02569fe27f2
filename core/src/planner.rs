use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

use crate::error::MealPlanError;
use crate::models::{Meal, MealType, NewPlan, Plan, PlanEntry, validate_num_days};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_start_date(s: &str) -> Result<NaiveDate, MealPlanError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
        MealPlanError::validation(format!("Invalid start date '{s}'. Use YYYY-MM-DD"))
    })
}

fn day_offset(start: NaiveDate, offset: u32) -> Result<NaiveDate, MealPlanError> {
    start
        .checked_add_days(Days::new(u64::from(offset)))
        .ok_or_else(|| MealPlanError::validation(format!("Date out of range: {start} + {offset} days")))
}

/// Assign a meal to every (day, slot) pair of the range.
///
/// Each slot on each day is drawn independently and uniformly from the
/// pool's meals of that type, so the same meal can repeat on consecutive
/// days. A slot with no candidates is left out rather than treated as an
/// error. Pass a seeded RNG for reproducible output.
pub fn generate_plan<R: Rng + ?Sized>(
    start_date: NaiveDate,
    num_days: u32,
    meal_pool: &[Meal],
    rng: &mut R,
) -> Result<NewPlan, MealPlanError> {
    let num_days = validate_num_days(num_days)?;

    let candidates: HashMap<MealType, Vec<&Meal>> = MealType::ALL
        .iter()
        .map(|slot| {
            let meals = meal_pool.iter().filter(|m| m.meal_type == *slot).collect();
            (*slot, meals)
        })
        .collect();

    let mut entries = Vec::new();
    for i in 0..num_days {
        let date = day_offset(start_date, i)?.format(DATE_FORMAT).to_string();
        for slot in MealType::ALL {
            let slot_pool = candidates.get(&slot).map(Vec::as_slice).unwrap_or_default();
            let Some(meal) = slot_pool.choose(rng) else {
                continue;
            };
            entries.push(PlanEntry {
                date: date.clone(),
                slot,
                meal_id: meal.id.clone(),
                servings: meal.plan_servings(),
            });
        }
    }

    tracing::info!(
        start_date = %start_date,
        num_days,
        pool = meal_pool.len(),
        entries = entries.len(),
        "generated plan"
    );

    Ok(NewPlan {
        start_date: start_date.format(DATE_FORMAT).to_string(),
        num_days,
        entries,
    })
}

// --- Display ---

#[derive(Debug, Clone, Serialize)]
pub struct PlanCell {
    pub slot: MealType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_id: Option<String>,
    /// Meal name, or the raw id when the meal has since been deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanDay {
    pub date: String,
    pub cells: Vec<PlanCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    pub id: String,
    pub start_date: String,
    pub num_days: u32,
    pub days: Vec<PlanDay>,
}

/// The calendar dates a plan covers.
#[must_use]
pub fn plan_dates(plan: &Plan) -> Vec<String> {
    let Ok(start) = parse_start_date(&plan.start_date) else {
        // Unparseable start date: fall back to whatever dates the entries carry.
        let mut dates: Vec<String> = plan.entries.iter().map(|e| e.date.clone()).collect();
        dates.dedup();
        return dates;
    };
    (0..plan.num_days)
        .map_while(|i| day_offset(start, i).ok())
        .map(|d| d.format(DATE_FORMAT).to_string())
        .collect()
}

/// Lay a plan out as days × slots, resolving meal names from `meal_names`
/// (meal id to name).
#[must_use]
pub fn build_plan_view(plan: &Plan, meal_names: &HashMap<String, String>) -> PlanView {
    let days = plan_dates(plan)
        .into_iter()
        .map(|date| {
            let cells = MealType::ALL
                .iter()
                .map(|slot| {
                    let entry = plan
                        .entries
                        .iter()
                        .find(|e| e.date == date && e.slot == *slot);
                    PlanCell {
                        slot: *slot,
                        meal_id: entry.map(|e| e.meal_id.clone()),
                        meal_name: entry.map(|e| {
                            meal_names
                                .get(&e.meal_id)
                                .cloned()
                                .unwrap_or_else(|| e.meal_id.clone())
                        }),
                        servings: entry.map(|e| e.servings),
                    }
                })
                .collect();
            PlanDay { date, cells }
        })
        .collect();

    PlanView {
        id: plan.id.clone(),
        start_date: plan.start_date.clone(),
        num_days: plan.num_days,
        days,
    }
}
