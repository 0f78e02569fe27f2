mod auth;
mod collection;
mod convert;
mod helpers;
mod ingredient;
mod meal;
mod plan;

pub(crate) use auth::{cmd_auth_login, cmd_auth_logout, cmd_auth_whoami};
pub(crate) use collection::cmd_list;
pub(crate) use convert::cmd_convert;
pub(crate) use helpers::PageOpts;
pub(crate) use ingredient::{cmd_ingredient_add, cmd_ingredient_delete, cmd_ingredient_list};
pub(crate) use meal::{cmd_meal_add, cmd_meal_delete, cmd_meal_import, cmd_meal_list, cmd_meal_show};
pub(crate) use plan::{cmd_plan_delete, cmd_plan_generate, cmd_plan_list, cmd_plan_show};
