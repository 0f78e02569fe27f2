use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealplan_core::error::MealPlanError;
use mealplan_core::models::{MealType, UserContext};
use mealplan_core::pagination::CollectionKind;
use mealplan_core::service::{MealDraft, MealPlanService};

use crate::config::Config;
use crate::spoonacular::SpoonacularClient;

use super::helpers::{
    PageOpts, exit_not_found, fetch_listing, fmt_qty, parse_ingredient_spec, print_next_cursor,
    truncate,
};

pub(crate) fn cmd_meal_import(
    svc: &MealPlanService,
    config: &Config,
    user: &UserContext,
    url: &str,
    meal_type: &str,
    json: bool,
) -> Result<()> {
    let meal_type: MealType = meal_type.parse()?;
    // Reject a blank URL before the API key is even looked up
    let url = mealplan_core::importer::validate_recipe_url(url)?;
    let client = SpoonacularClient::new(config.spoonacular_api_key()?)?;

    let summary =
        tokio::task::block_in_place(|| svc.import_recipe(&client, user, url, meal_type))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let name = &summary.meal.name;
        let id = &summary.meal.id;
        let lines = summary.meal.ingredient_lines.len();
        println!("Imported: {name} (id: {id})");
        println!(
            "  {lines} ingredient lines, {} new ingredients, {} reused",
            summary.ingredients_created, summary.ingredients_reused
        );
        if summary.lines_skipped > 0 {
            eprintln!(
                "  Skipped {} ingredient lines without a name",
                summary.lines_skipped
            );
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_meal_add(
    svc: &MealPlanService,
    user: &UserContext,
    name: &str,
    meal_type: &str,
    servings: Option<f64>,
    instructions: Option<String>,
    ingredients: &[String],
    json: bool,
) -> Result<()> {
    let meal_type: MealType = meal_type.parse()?;
    let ingredients = ingredients
        .iter()
        .map(|spec| parse_ingredient_spec(spec))
        .collect::<Result<Vec<_>>>()?;

    let meal = svc.add_meal(
        user,
        &MealDraft {
            name: name.to_string(),
            meal_type,
            instructions: instructions.unwrap_or_default(),
            default_servings: servings,
            ingredients,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        let name = &meal.name;
        let id = &meal.id;
        let label = meal.meal_type.label();
        println!("Added meal: {name} [{label}] (id: {id})");
    }
    Ok(())
}

pub(crate) fn cmd_meal_list(
    svc: &MealPlanService,
    user: &UserContext,
    opts: &PageOpts,
    meal_type: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Type")]
        meal_type: String,
        #[tabled(rename = "Servings")]
        servings: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
    }

    let filter: Option<MealType> = meal_type.map(str::parse::<MealType>).transpose()?;
    let mut page = fetch_listing(
        opts,
        CollectionKind::Meals.default_page_size(),
        |size, cursor| svc.db().list_meals_page(user, size, cursor),
    )?;
    // Filtering is applied per page; the cursor still walks the full collection.
    if let Some(filter) = filter {
        page.items.retain(|m| m.meal_type == filter);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.items.is_empty() {
        eprintln!("No meals found");
        print_next_cursor(page.next_cursor.as_deref());
        return Ok(());
    }

    let rows: Vec<MealRow> = page
        .items
        .iter()
        .map(|m| MealRow {
            id: m.id.clone(),
            name: truncate(&m.name, 35),
            meal_type: m.meal_type.label().to_string(),
            servings: m.default_servings.map_or("-".into(), fmt_qty),
            ingredients: m.ingredient_lines.len(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    print_next_cursor(page.next_cursor.as_deref());

    Ok(())
}

pub(crate) fn cmd_meal_show(
    svc: &MealPlanService,
    user: &UserContext,
    id: &str,
    json: bool,
) -> Result<()> {
    let meal = match svc.get_meal(user, id) {
        Ok(meal) => meal,
        Err(e) if matches!(e.downcast_ref::<MealPlanError>(), Some(MealPlanError::NotFound(_))) => {
            exit_not_found(&format!("Meal {id} not found"), json);
        }
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
        return Ok(());
    }

    let name = &meal.name;
    let label = meal.meal_type.label();
    println!("=== {name} ===");
    print!("  Type: {label}");
    if let Some(servings) = meal.default_servings {
        print!("  |  Servings: {}", fmt_qty(servings));
    }
    println!();
    if let Some(url) = &meal.url {
        println!("  Source: {url}");
    }

    if !meal.ingredient_lines.is_empty() {
        println!("\n  INGREDIENTS:");
        for line in &meal.ingredient_lines {
            // Deleted ingredients still show by id
            let ing_name = svc
                .db()
                .get_ingredient(user, &line.ingredient_id)
                .map_or_else(|_| line.ingredient_id.clone(), |i| i.name);
            println!("    {} {} {ing_name}", fmt_qty(line.quantity), line.unit);
        }
    }

    if let Some(macros) = meal.macros.as_deref().filter(|m| !m.is_empty()) {
        println!("\n  NUTRITION:");
        println!("    {macros}");
    }

    if !meal.instructions.is_empty() {
        println!("\n  INSTRUCTIONS:");
        for para in meal.instructions.lines().filter(|l| !l.trim().is_empty()) {
            println!("    {}", para.trim());
        }
    }

    Ok(())
}

pub(crate) fn cmd_meal_delete(
    svc: &MealPlanService,
    user: &UserContext,
    id: &str,
    json: bool,
) -> Result<()> {
    if !svc.delete_meal(user, id)? {
        exit_not_found(&format!("Meal {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted meal {id}");
        println!("Plans that used it keep showing its id.");
    }
    Ok(())
}
