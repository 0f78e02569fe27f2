use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::MealPlanError;
use crate::models::{Ingredient, Meal, Plan};

/// Position just after the last item of a page: the sort key plus the id
/// that breaks ties between equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "k")]
    pub sort_key: String,
    pub id: String,
}

impl Cursor {
    pub fn new(sort_key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            sort_key: sort_key.into(),
            id: id.into(),
        }
    }

    /// Opaque token handed to callers.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, MealPlanError> {
        let invalid = || MealPlanError::validation(format!("Invalid page cursor '{token}'"));
        let bytes = URL_SAFE_NO_PAD.decode(token.trim()).map_err(|_| invalid())?;
        serde_json::from_slice(&bytes).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Set whenever the page came back full, so a full final page is
    /// followed by one empty fetch before the walk stops.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page from rows fetched with `LIMIT page_size`.
    pub fn from_rows(items: Vec<T>, page_size: u32, key: impl Fn(&T) -> Cursor) -> Self {
        let next_cursor = if items.len() == page_size as usize {
            items.last().map(|last| key(last).encode())
        } else {
            None
        };
        Self { items, next_cursor }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Ingredients,
    Meals,
    Plans,
}

impl CollectionKind {
    #[must_use]
    pub fn default_page_size(self) -> u32 {
        match self {
            Self::Ingredients | Self::Meals => 20,
            Self::Plans => 10,
        }
    }

    /// Field the collection is ordered by.
    #[must_use]
    pub fn sort_field(self) -> &'static str {
        match self {
            Self::Ingredients | Self::Meals => "name",
            Self::Plans => "start_date",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingredients => "ingredients",
            Self::Meals => "meals",
            Self::Plans => "plans",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = MealPlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ingredients" | "ingredient" => Ok(Self::Ingredients),
            "meals" | "meal" => Ok(Self::Meals),
            "plans" | "plan" => Ok(Self::Plans),
            _ => Err(MealPlanError::validation(format!(
                "Unknown collection '{s}'. Must be one of: ingredients, meals, plans"
            ))),
        }
    }
}

/// An item from any of the paged collections.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Ingredient(Ingredient),
    Meal(Meal),
    Plan(Plan),
}

impl Entity {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Ingredient(i) => &i.id,
            Self::Meal(m) => &m.id,
            Self::Plan(p) => &p.id,
        }
    }

    /// Value of the collection's sort field for this item.
    #[must_use]
    pub fn sort_key(&self) -> &str {
        match self {
            Self::Ingredient(i) => &i.name,
            Self::Meal(m) => &m.name,
            Self::Plan(p) => &p.start_date,
        }
    }
}

pub fn validate_page_size(page_size: u32) -> Result<u32, MealPlanError> {
    if page_size == 0 {
        return Err(MealPlanError::validation(
            "Page size must be greater than 0",
        ));
    }
    Ok(page_size)
}

/// Walk a collection page by page until the cursor runs out.
pub fn collect_all<T, F>(page_size: u32, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32, Option<&str>) -> Result<Page<T>>,
{
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = fetch(page_size, cursor.as_deref())?;
        all.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_token_roundtrip() {
        let cursor = Cursor::new("Pancakes", "0b7c");
        let token = cursor.encode();
        assert!(!token.contains('='));
        assert_eq!(Cursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn test_cursor_decode_garbage() {
        let err = Cursor::decode("not a cursor!").unwrap_err();
        assert!(matches!(err, MealPlanError::Validation(_)));
        // Valid base64 but not a cursor
        let token = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert!(Cursor::decode(&token).is_err());
    }

    #[test]
    fn test_full_page_has_cursor() {
        let page = Page::from_rows(vec!["a", "b"], 2, |s| Cursor::new(*s, *s));
        let cursor = Cursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(cursor.sort_key, "b");
    }

    #[test]
    fn test_partial_and_empty_pages_have_no_cursor() {
        let page = Page::from_rows(vec!["a"], 2, |s| Cursor::new(*s, *s));
        assert!(page.next_cursor.is_none());

        let page: Page<&str> = Page::from_rows(vec![], 2, |s| Cursor::new(*s, *s));
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_default_page_sizes() {
        assert_eq!(CollectionKind::Ingredients.default_page_size(), 20);
        assert_eq!(CollectionKind::Meals.default_page_size(), 20);
        assert_eq!(CollectionKind::Plans.default_page_size(), 10);
        assert_eq!(CollectionKind::Plans.sort_field(), "start_date");
    }

    #[test]
    fn test_collection_kind_parse() {
        assert_eq!("Meals".parse::<CollectionKind>().unwrap(), CollectionKind::Meals);
        assert_eq!("plan".parse::<CollectionKind>().unwrap(), CollectionKind::Plans);
        assert!("recipes".parse::<CollectionKind>().is_err());
        assert_eq!(CollectionKind::Ingredients.to_string(), "ingredients");
    }

    #[test]
    fn test_validate_page_size() {
        assert!(validate_page_size(0).is_err());
        assert_eq!(validate_page_size(5).unwrap(), 5);
    }

    #[test]
    fn test_collect_all_stops_after_empty_page() {
        // Four items in pages of two: two full pages, then an empty one.
        let data = ["a", "b", "c", "d"];
        let mut calls = 0;
        let all = collect_all(2, |size, cursor| {
            calls += 1;
            let start = match cursor {
                Some(token) => {
                    let c = Cursor::decode(token)?;
                    data.iter().position(|d| *d == c.id).unwrap() + 1
                }
                None => 0,
            };
            let rows: Vec<&str> = data.iter().skip(start).take(size as usize).copied().collect();
            Ok(Page::from_rows(rows, size, |s| Cursor::new(*s, *s)))
        })
        .unwrap();
        assert_eq!(all, vec!["a", "b", "c", "d"]);
        assert_eq!(calls, 3);
    }
}
