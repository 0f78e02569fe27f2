use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::process;

use mealplan_core::importer::ImportedLine;
use mealplan_core::pagination::{Page, collect_all};
use mealplan_core::units::DEFAULT_UNIT;

/// Paging flags shared by the list commands.
pub(crate) struct PageOpts {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub all: bool,
}

/// One page (or, with `--all`, every page) of a collection.
pub(crate) fn fetch_listing<T, F>(opts: &PageOpts, default_size: u32, mut fetch: F) -> Result<Page<T>>
where
    F: FnMut(u32, Option<&str>) -> Result<Page<T>>,
{
    let size = opts.limit.unwrap_or(default_size);
    if opts.all {
        let items = collect_all(size, fetch)?;
        return Ok(Page {
            items,
            next_cursor: None,
        });
    }
    fetch(size, opts.cursor.as_deref())
}

pub(crate) fn print_next_cursor(next_cursor: Option<&str>) {
    if let Some(cursor) = next_cursor {
        eprintln!("\nMore results: --cursor {cursor}");
    }
}

pub(crate) fn parse_date(date_str: Option<&str>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s {
            "today" => Ok(Local::now().date_naive()),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD or today/tomorrow")),
        },
    }
}

/// Parse `NAME[:QTY[:UNIT]]`, e.g. `flour:2:cup` or `eggs:3`.
pub(crate) fn parse_ingredient_spec(spec: &str) -> Result<ImportedLine> {
    let mut parts = spec.splitn(3, ':').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        bail!("Invalid ingredient '{spec}'. Use NAME[:QTY[:UNIT]], e.g. 'flour:2:cup'");
    }
    let quantity = match parts.next().filter(|q| !q.is_empty()) {
        Some(q) => {
            let value: f64 = q
                .parse()
                .with_context(|| format!("Invalid quantity '{q}' in '{spec}'"))?;
            if value <= 0.0 {
                bail!("Quantity must be greater than 0 in '{spec}'");
            }
            value
        }
        None => 1.0,
    };
    let unit = parts
        .next()
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_UNIT)
        .to_lowercase();
    Ok(ImportedLine {
        name: name.to_string(),
        quantity,
        unit,
    })
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn fmt_qty(v: f64) -> String {
    let v = if v == 0.0 { 0.0 } else { v };
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealplan_core::pagination::Cursor;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
        assert_eq!(parse_date(Some("today")).unwrap(), today);
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope")).is_err());
    }

    #[test]
    fn test_parse_ingredient_spec() {
        let line = parse_ingredient_spec("flour:2:CUP").unwrap();
        assert_eq!(line.name, "flour");
        assert!((line.quantity - 2.0).abs() < f64::EPSILON);
        assert_eq!(line.unit, "cup");

        let line = parse_ingredient_spec("eggs").unwrap();
        assert!((line.quantity - 1.0).abs() < f64::EPSILON);
        assert_eq!(line.unit, "pc");

        let line = parse_ingredient_spec("olive oil:1.5:tbsp").unwrap();
        assert_eq!(line.name, "olive oil");
    }

    #[test]
    fn test_parse_ingredient_spec_invalid() {
        assert!(parse_ingredient_spec(":2:cup").is_err());
        assert!(parse_ingredient_spec("salt:lots").is_err());
        assert!(parse_ingredient_spec("salt:0").is_err());
    }

    #[test]
    fn test_fetch_listing_single_page() {
        let opts = PageOpts {
            limit: Some(2),
            cursor: None,
            all: false,
        };
        let page = fetch_listing(&opts, 20, |size, _| {
            assert_eq!(size, 2);
            Ok(Page::from_rows(vec!["a", "b"], size, |s| Cursor::new(*s, *s)))
        })
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_cursor.is_some());
    }

    #[test]
    fn test_fetch_listing_all() {
        let opts = PageOpts {
            limit: Some(1),
            cursor: None,
            all: true,
        };
        let data = ["a", "b", "c"];
        let page = fetch_listing(&opts, 20, |size, cursor| {
            let start = match cursor {
                Some(token) => {
                    let last = Cursor::decode(token)?;
                    data.iter().position(|d| *d == last.id).unwrap() + 1
                }
                None => 0,
            };
            let rows: Vec<&str> = data.iter().skip(start).take(size as usize).copied().collect();
            Ok(Page::from_rows(rows, size, |s| Cursor::new(*s, *s)))
        })
        .unwrap();
        assert_eq!(page.items, vec!["a", "b", "c"]);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_fmt_qty() {
        assert_eq!(fmt_qty(2.0), "2");
        assert_eq!(fmt_qty(1.5), "1.5");
        assert_eq!(fmt_qty(0.333_333), "0.33");
        assert_eq!(fmt_qty(-0.0), "0");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("nope"), r#"{"error":"nope"}"#);
    }
}
