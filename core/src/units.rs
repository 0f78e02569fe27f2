//! Cooking unit conversions.
//!
//! The table only holds direct factors. There is no multi-hop search, so a
//! pair without an entry (say `oz` to `cup`) converts to the input quantity
//! unchanged and callers have to live with the unit mismatch.

/// Units the front ends offer when entering quantities.
pub const IMPERIAL_UNITS: &[&str] = &[
    "oz", "lb", "cup", "tbsp", "tsp", "pc", "pint", "quart", "gallon",
];

/// Fallback unit for ingredients imported without one.
pub const DEFAULT_UNIT: &str = "pc";

const CONVERSIONS: &[(&str, &str, f64)] = &[
    // weight
    ("oz", "lb", 1.0 / 16.0),
    ("lb", "oz", 16.0),
    // volume (rough cooking approximations)
    ("tsp", "tbsp", 1.0 / 3.0),
    ("tsp", "cup", 1.0 / 48.0),
    ("tbsp", "tsp", 3.0),
    ("tbsp", "cup", 1.0 / 16.0),
    ("cup", "tbsp", 16.0),
    ("cup", "tsp", 48.0),
    ("cup", "pint", 0.5),
    ("cup", "quart", 0.25),
    ("cup", "gallon", 1.0 / 16.0),
    ("pint", "cup", 2.0),
    ("pint", "quart", 0.5),
    ("pint", "gallon", 0.125),
    ("quart", "cup", 4.0),
    ("quart", "pint", 2.0),
    ("quart", "gallon", 0.25),
    ("gallon", "cup", 16.0),
    ("gallon", "pint", 8.0),
    ("gallon", "quart", 4.0),
];

/// Lookup form of a unit name. Blank units become [`DEFAULT_UNIT`].
#[must_use]
pub fn normalize_unit(unit: &str) -> String {
    let unit = unit.trim().to_lowercase();
    if unit.is_empty() {
        DEFAULT_UNIT.to_string()
    } else {
        unit
    }
}

/// Direct multiplicative factor from one unit to another, if the table has one.
#[must_use]
pub fn factor(from_unit: &str, to_unit: &str) -> Option<f64> {
    let from = normalize_unit(from_unit);
    let to = normalize_unit(to_unit);
    if from == to {
        return Some(1.0);
    }
    CONVERSIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, factor)| *factor)
}

/// Like [`convert`], but reports `None` when no direct factor exists.
#[must_use]
pub fn try_convert(quantity: f64, from_unit: &str, to_unit: &str) -> Option<f64> {
    factor(from_unit, to_unit).map(|f| quantity * f)
}

/// Convert `quantity` between units, returning it unchanged when there is no
/// direct path.
#[must_use]
pub fn convert(quantity: f64, from_unit: &str, to_unit: &str) -> f64 {
    try_convert(quantity, from_unit, to_unit).unwrap_or(quantity)
}
