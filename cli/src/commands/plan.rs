use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tabled::{
    Table, Tabled,
    settings::{Modify, Style, Width, object::Columns},
};

use mealplan_core::error::MealPlanError;
use mealplan_core::models::{MealType, UserContext};
use mealplan_core::pagination::CollectionKind;
use mealplan_core::planner::{DATE_FORMAT, PlanCell, PlanView};
use mealplan_core::service::MealPlanService;

use super::helpers::{PageOpts, exit_not_found, fetch_listing, fmt_qty, parse_date, print_next_cursor};

pub(crate) fn cmd_plan_generate(
    svc: &MealPlanService,
    user: &UserContext,
    start: Option<&str>,
    days: u32,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let start = parse_date(start)?.format(DATE_FORMAT).to_string();
    let plan = match seed {
        Some(seed) => svc.generate_and_save_plan(user, &start, days, &mut StdRng::seed_from_u64(seed))?,
        None => svc.generate_and_save_plan(user, &start, days, &mut rand::rng())?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let view = svc.plan_view(user, &plan.id)?;
    print_plan_view(&view);
    let filled = plan.entries.len();
    let total = plan.num_days as usize * MealType::ALL.len();
    if filled < total {
        eprintln!("\n{filled} of {total} slots filled. Add meals of the missing types to fill the rest.");
    }
    Ok(())
}

pub(crate) fn cmd_plan_list(
    svc: &MealPlanService,
    user: &UserContext,
    opts: &PageOpts,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Start")]
        start_date: String,
        #[tabled(rename = "Days")]
        num_days: u32,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Created")]
        created_at: String,
    }

    let page = fetch_listing(
        opts,
        CollectionKind::Plans.default_page_size(),
        |size, cursor| svc.db().list_plans_page(user, size, cursor),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.items.is_empty() {
        eprintln!("No plans found");
        return Ok(());
    }

    let rows: Vec<PlanRow> = page
        .items
        .iter()
        .map(|p| PlanRow {
            id: p.id.clone(),
            start_date: p.start_date.clone(),
            num_days: p.num_days,
            entries: p.entries.len(),
            created_at: p.created_at.chars().take(10).collect(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    print_next_cursor(page.next_cursor.as_deref());

    Ok(())
}

pub(crate) fn cmd_plan_show(
    svc: &MealPlanService,
    user: &UserContext,
    id: &str,
    json: bool,
) -> Result<()> {
    let view = match svc.plan_view(user, id) {
        Ok(view) => view,
        Err(e) if matches!(e.downcast_ref::<MealPlanError>(), Some(MealPlanError::NotFound(_))) => {
            exit_not_found(&format!("Plan {id} not found"), json);
        }
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_plan_view(&view);
    }
    Ok(())
}

pub(crate) fn cmd_plan_delete(
    svc: &MealPlanService,
    user: &UserContext,
    id: &str,
    json: bool,
) -> Result<()> {
    if !svc.delete_plan(user, id)? {
        exit_not_found(&format!("Plan {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted plan {id}");
    }
    Ok(())
}

fn cell_text(cell: &PlanCell) -> String {
    match (&cell.meal_name, cell.servings) {
        (Some(name), Some(servings)) => format!("{name} (x{})", fmt_qty(servings)),
        (Some(name), None) => name.clone(),
        (None, _) => "No meal".to_string(),
    }
}

fn print_plan_view(view: &PlanView) {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Breakfast")]
        breakfast: String,
        #[tabled(rename = "Dinner")]
        lunch_dinner: String,
        #[tabled(rename = "Snack")]
        snack: String,
    }

    let slot_text = |cells: &[PlanCell], slot: MealType| {
        cells
            .iter()
            .find(|c| c.slot == slot)
            .map_or_else(|| "No meal".to_string(), cell_text)
    };

    let rows: Vec<DayRow> = view
        .days
        .iter()
        .map(|day| DayRow {
            date: day.date.clone(),
            breakfast: slot_text(&day.cells, MealType::Breakfast),
            lunch_dinner: slot_text(&day.cells, MealType::LunchDinner),
            snack: slot_text(&day.cells, MealType::Snack),
        })
        .collect();

    let start = &view.start_date;
    let days = view.num_days;
    let id = &view.id;
    println!("=== Plan from {start} ({days} days) ===");
    println!("  id: {id}\n");
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Width::wrap(28)))
        .to_string();
    println!("{table}");
}
