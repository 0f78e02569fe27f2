use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealplan_core::models::{NewIngredient, UserContext};
use mealplan_core::pagination::CollectionKind;
use mealplan_core::service::MealPlanService;

use super::helpers::{
    PageOpts, exit_not_found, fetch_listing, fmt_qty, print_next_cursor, truncate,
};

pub(crate) fn cmd_ingredient_add(
    svc: &MealPlanService,
    user: &UserContext,
    name: &str,
    unit: &str,
    amount: Option<f64>,
    servings: Option<f64>,
    json: bool,
) -> Result<()> {
    let ingredient = svc.add_ingredient(
        user,
        &NewIngredient {
            name: name.to_string(),
            unit: unit.to_string(),
            amount,
            servings,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let name = &ingredient.name;
        let id = &ingredient.id;
        println!("Added ingredient: {name} (id: {id})");
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(
    svc: &MealPlanService,
    user: &UserContext,
    opts: &PageOpts,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Unit")]
        unit: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Servings")]
        servings: String,
    }

    let page = fetch_listing(
        opts,
        CollectionKind::Ingredients.default_page_size(),
        |size, cursor| svc.db().list_ingredients_page(user, size, cursor),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.items.is_empty() {
        eprintln!("No ingredients found");
        return Ok(());
    }

    let rows: Vec<IngredientRow> = page
        .items
        .iter()
        .map(|i| IngredientRow {
            id: i.id.clone(),
            name: truncate(&i.name, 30),
            unit: i.unit.clone(),
            amount: fmt_qty(i.amount),
            servings: fmt_qty(i.servings),
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

pub(crate) fn cmd_ingredient_delete(
    svc: &MealPlanService,
    user: &UserContext,
    id: &str,
    json: bool,
) -> Result<()> {
    if !svc.delete_ingredient(user, id)? {
        exit_not_found(&format!("Ingredient {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted ingredient {id}");
    }
    Ok(())
}
