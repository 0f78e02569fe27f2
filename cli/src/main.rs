mod commands;
mod config;
mod server;
mod spoonacular;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::process;
use std::sync::Arc;

use crate::commands::{
    PageOpts, cmd_auth_login, cmd_auth_logout, cmd_auth_whoami, cmd_convert, cmd_ingredient_add,
    cmd_ingredient_delete, cmd_ingredient_list, cmd_list, cmd_meal_add, cmd_meal_delete,
    cmd_meal_import, cmd_meal_list, cmd_meal_show, cmd_plan_delete, cmd_plan_generate,
    cmd_plan_list, cmd_plan_show,
};
use crate::config::Config;
use crate::spoonacular::SpoonacularClient;
use mealplan_core::importer::RecipeExtractor;
use mealplan_core::models::{MAX_PLAN_DAYS, MIN_PLAN_DAYS};
use mealplan_core::service::MealPlanService;

#[derive(Parser)]
#[command(
    name = "mealplan",
    version,
    about = "Import recipes and generate random meal plans",
    long_about = "Import recipes from the web, keep them as meals, and generate \
                  randomized multi-day meal plans from them."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ListArgs {
    /// Items per page (default depends on the collection)
    #[arg(short, long)]
    limit: Option<u32>,
    /// Continue after this cursor (printed by the previous page)
    #[arg(long, conflicts_with = "all")]
    cursor: Option<String>,
    /// Fetch every page
    #[arg(long)]
    all: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl ListArgs {
    fn page_opts(&self) -> PageOpts {
        PageOpts {
            limit: self.limit,
            cursor: self.cursor.clone(),
            all: self.all,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, show or clear the local profile
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage ingredients
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Import and manage meals
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Generate and manage meal plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Page through any collection (ingredients, meals or plans)
    List {
        /// Collection to list: ingredients, meals or plans
        kind: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Convert a quantity between cooking units
    Convert {
        /// Quantity to convert
        quantity: f64,
        /// Source unit (oz, lb, cup, tbsp, tsp, pc, pint, quart, gallon)
        from: String,
        /// Target unit
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Sign in with a display name
    Login {
        /// Display name
        name: String,
        /// Use a specific user id (e.g. to share data with a server client)
        #[arg(long)]
        user_id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the signed-in user
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign out
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient
    Add {
        /// Ingredient name (unique per user, case-insensitive)
        name: String,
        /// Unit of measure
        #[arg(short, long, default_value = "pc")]
        unit: String,
        /// Package amount
        #[arg(long)]
        amount: Option<f64>,
        /// Servings per package
        #[arg(long)]
        servings: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List ingredients by name
    List(ListArgs),
    /// Delete an ingredient by ID
    Delete {
        /// Ingredient ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Import a recipe from a URL
    Import {
        /// Recipe page URL
        url: String,
        /// Meal type: breakfast, lunch_dinner (or dinner), snack
        #[arg(short, long, default_value = "lunch_dinner")]
        meal_type: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a meal by hand
    Add {
        /// Meal name
        name: String,
        /// Meal type: breakfast, lunch_dinner (or dinner), snack
        #[arg(short, long, default_value = "lunch_dinner")]
        meal_type: String,
        /// Default servings used when the meal lands in a plan
        #[arg(short, long)]
        servings: Option<f64>,
        /// Cooking instructions
        #[arg(long)]
        instructions: Option<String>,
        /// Ingredient as NAME[:QTY[:UNIT]] (repeatable), e.g. -i flour:2:cup
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List meals by name
    List {
        #[command(flatten)]
        list: ListArgs,
        /// Only show meals of this type
        #[arg(short = 't', long)]
        meal_type: Option<String>,
    },
    /// Show a meal with its ingredients and instructions
    Show {
        /// Meal ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal by ID (plans keep referencing its id)
    Delete {
        /// Meal ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Generate a plan from your meals and save it
    Generate {
        /// First day (YYYY-MM-DD or today/tomorrow, default: today)
        #[arg(long)]
        start: Option<String>,
        /// Number of days
        #[arg(
            short,
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(i64::from(MIN_PLAN_DAYS)..=i64::from(MAX_PLAN_DAYS))
        )]
        days: u32,
        /// Seed the random choice for a reproducible plan
        #[arg(long)]
        seed: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List plans by start date
    List(ListArgs),
    /// Show a plan as a day-by-slot table
    Show {
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a plan by ID
    Delete {
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Auth { command } => match command {
            AuthCommands::Login {
                name,
                user_id,
                json,
            } => cmd_auth_login(&config, &name, user_id.as_deref(), json),
            AuthCommands::Whoami { json } => cmd_auth_whoami(&config, json),
            AuthCommands::Logout { json } => cmd_auth_logout(&config, json),
        },
        Commands::Convert {
            quantity,
            from,
            to,
            json,
        } => cmd_convert(quantity, &from, &to, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let svc = MealPlanService::new(&config.db_path)?;
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            let extractor = match config.spoonacular_api_key() {
                Ok(key) => {
                    let client: Arc<dyn RecipeExtractor> = Arc::new(SpoonacularClient::new(key)?);
                    Some(client)
                }
                Err(_) => None,
            };
            server::start_server(svc, port, &bind, api_key, extractor).await
        }
        Commands::List { kind, list } => {
            let user = config.require_session()?;
            let svc = MealPlanService::new(&config.db_path)?;
            cmd_list(&svc, &user, &kind, &list.page_opts(), list.json)
        }
        Commands::Ingredient { command } => {
            let user = config.require_session()?;
            let svc = MealPlanService::new(&config.db_path)?;
            match command {
                IngredientCommands::Add {
                    name,
                    unit,
                    amount,
                    servings,
                    json,
                } => cmd_ingredient_add(&svc, &user, &name, &unit, amount, servings, json),
                IngredientCommands::List(list) => {
                    cmd_ingredient_list(&svc, &user, &list.page_opts(), list.json)
                }
                IngredientCommands::Delete { id, json } => {
                    cmd_ingredient_delete(&svc, &user, &id, json)
                }
            }
        }
        Commands::Meal { command } => {
            let user = config.require_session()?;
            let svc = MealPlanService::new(&config.db_path)?;
            match command {
                MealCommands::Import {
                    url,
                    meal_type,
                    json,
                } => cmd_meal_import(&svc, &config, &user, &url, &meal_type, json),
                MealCommands::Add {
                    name,
                    meal_type,
                    servings,
                    instructions,
                    ingredients,
                    json,
                } => cmd_meal_add(
                    &svc,
                    &user,
                    &name,
                    &meal_type,
                    servings,
                    instructions,
                    &ingredients,
                    json,
                ),
                MealCommands::List { list, meal_type } => cmd_meal_list(
                    &svc,
                    &user,
                    &list.page_opts(),
                    meal_type.as_deref(),
                    list.json,
                ),
                MealCommands::Show { id, json } => cmd_meal_show(&svc, &user, &id, json),
                MealCommands::Delete { id, json } => cmd_meal_delete(&svc, &user, &id, json),
            }
        }
        Commands::Plan { command } => {
            let user = config.require_session()?;
            let svc = MealPlanService::new(&config.db_path)?;
            match command {
                PlanCommands::Generate {
                    start,
                    days,
                    seed,
                    json,
                } => cmd_plan_generate(&svc, &user, start.as_deref(), days, seed, json),
                PlanCommands::List(list) => {
                    cmd_plan_list(&svc, &user, &list.page_opts(), list.json)
                }
                PlanCommands::Show { id, json } => cmd_plan_show(&svc, &user, &id, json),
                PlanCommands::Delete { id, json } => cmd_plan_delete(&svc, &user, &id, json),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_days_range() {
        assert!(Cli::try_parse_from(["mealplan", "plan", "generate", "--days", "28"]).is_ok());
        assert!(Cli::try_parse_from(["mealplan", "plan", "generate", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["mealplan", "plan", "generate", "--days", "29"]).is_err());
        assert!(Cli::try_parse_from(["mealplan", "plan", "generate", "--days", "abc"]).is_err());
    }

    #[test]
    fn test_list_collection_args() {
        let cli = Cli::try_parse_from(["mealplan", "list", "plans", "--limit", "5"]).unwrap();
        let Commands::List { kind, list } = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(kind, "plans");
        assert_eq!(list.limit, Some(5));
        assert!(Cli::try_parse_from(["mealplan", "list"]).is_err());
    }

    #[test]
    fn test_cursor_conflicts_with_all() {
        assert!(
            Cli::try_parse_from(["mealplan", "meal", "list", "--all", "--cursor", "x"]).is_err()
        );
    }
}
