use anyhow::{Result, bail};
use serde::Serialize;

use mealplan_core::units;

#[derive(Serialize)]
struct Conversion<'a> {
    quantity: f64,
    from: &'a str,
    to: &'a str,
    result: f64,
    converted: bool,
}

pub(crate) fn cmd_convert(quantity: f64, from: &str, to: &str, json: bool) -> Result<()> {
    if !quantity.is_finite() {
        bail!("Quantity must be a number");
    }
    let converted = units::try_convert(quantity, from, to);
    let result = converted.unwrap_or(quantity);

    if json {
        let out = Conversion {
            quantity,
            from,
            to,
            result,
            converted: converted.is_some(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{quantity} {from} = {result} {to}");
    if converted.is_none() {
        eprintln!(
            "Note: no direct conversion from '{from}' to '{to}'; quantity left unchanged. Known units: {}",
            units::IMPERIAL_UNITS.join(", ")
        );
    }
    Ok(())
}
