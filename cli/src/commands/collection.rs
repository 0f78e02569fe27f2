use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use mealplan_core::models::UserContext;
use mealplan_core::pagination::{CollectionKind, Entity};
use mealplan_core::service::MealPlanService;

use super::helpers::{PageOpts, fetch_listing, print_next_cursor, truncate};

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Key")]
    key: String,
}

fn entity_row(entity: &Entity) -> EntityRow {
    EntityRow {
        id: entity.id().to_string(),
        key: truncate(entity.sort_key(), 40),
    }
}

/// Page through any collection in its sort order.
pub(crate) fn cmd_list(
    svc: &MealPlanService,
    user: &UserContext,
    kind: &str,
    opts: &PageOpts,
    json: bool,
) -> Result<()> {
    let kind: CollectionKind = kind.parse()?;
    let page = fetch_listing(opts, kind.default_page_size(), |size, cursor| {
        svc.fetch_page(kind, user, Some(size), cursor)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.items.is_empty() {
        eprintln!("No {kind} found");
        return Ok(());
    }

    let rows: Vec<EntityRow> = page.items.iter().map(entity_row).collect();
    println!("{kind} by {}", kind.sort_field());
    println!("{}", Table::new(&rows).with(Style::rounded()));
    print_next_cursor(page.next_cursor.as_deref());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealplan_core::models::{MealType, NewIngredient};
    use mealplan_core::service::MealDraft;

    #[test]
    fn test_entity_row_uses_sort_key() {
        let svc = MealPlanService::new_in_memory().unwrap();
        let user = UserContext::new("u1", "Cook");
        svc.add_ingredient(&user, &NewIngredient::named("Basil", "pc"))
            .unwrap();
        svc.add_meal(
            &user,
            &MealDraft {
                name: "Toast".to_string(),
                meal_type: MealType::Breakfast,
                instructions: String::new(),
                default_servings: None,
                ingredients: vec![],
            },
        )
        .unwrap();
        let plan = svc
            .generate_and_save_plan(&user, "2024-03-01", 1, &mut rand::rng())
            .unwrap();

        let page = svc
            .fetch_page(CollectionKind::Plans, &user, None, None)
            .unwrap();
        let row = entity_row(&page.items[0]);
        assert_eq!(row.id, plan.id);
        assert_eq!(row.key, "2024-03-01");

        let page = svc
            .fetch_page(CollectionKind::Ingredients, &user, None, None)
            .unwrap();
        assert_eq!(entity_row(&page.items[0]).key, "Basil");
    }
}
