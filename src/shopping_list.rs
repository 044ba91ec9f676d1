//! Shopping-list aggregation.
//!
//! Every ingredient row of every recipe in a user's cart contributes its
//! amount to a `(name, measurement_unit)` bucket. The same ingredient used by
//! two cart recipes therefore shows up once, with the summed amount.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingList {
    pub owner: String,
    pub items: Vec<ShoppingListItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    Txt,
    Csv,
    Json,
}

impl ListFormat {
    pub fn parse(value: Option<&str>) -> AppResult<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("txt") => Ok(ListFormat::Txt),
            Some("csv") => Ok(ListFormat::Csv),
            Some("json") => Ok(ListFormat::Json),
            Some(other) => Err(AppError::BadRequest(format!("Invalid format '{}'. Use 'txt', 'csv' or 'json'", other))),
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ListFormat::Txt => "shopping-list.txt",
            ListFormat::Csv => "shopping-list.csv",
            ListFormat::Json => "shopping-list.json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ListFormat::Txt => "text/plain; charset=utf-8",
            ListFormat::Csv => "text/csv; charset=utf-8",
            ListFormat::Json => "application/json; charset=utf-8",
        }
    }
}

/// Sums amounts per `(name, unit)`; the result is sorted by name, then unit.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingListItem>
where
    I: IntoIterator<Item = (String, String, i64)>,
{
    let mut buckets: BTreeMap<(String, String), i64> = BTreeMap::new();
    for (name, unit, amount) in lines {
        let total = buckets.entry((name, unit)).or_insert(0);
        *total = total.saturating_add(amount);
    }
    buckets
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListItem { name, measurement_unit, amount })
        .collect()
}

impl ShoppingList {
    /// Loads and aggregates the cart of `user_id`.
    pub async fn for_user(db: &SqlitePool, user_id: i64, owner: &str) -> AppResult<Self> {
        let rows = sqlx::query(
            r#"SELECT i.name, i.measurement_unit, ri.amount
               FROM shopping_cart sc
               JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
               JOIN ingredients i ON i.id = ri.ingredient_id
               WHERE sc.user_id = ?1"#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        let items = aggregate(rows.iter().map(|r| {
            (r.get::<String, _>("name"), r.get::<String, _>("measurement_unit"), r.get::<i64, _>("amount"))
        }));
        Ok(Self { owner: owner.to_string(), items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn render_text(&self) -> String {
        if self.is_empty() {
            return "Your shopping list is empty. Add some recipes to the cart and download it again!\n".to_string();
        }
        let mut out = format!("Shopping list for {}:\n", self.owner);
        for item in &self.items {
            out.push_str(&format!("* {} ({}) - {}\n", item.name, item.measurement_unit, item.amount));
        }
        out
    }

    pub fn render_csv(&self) -> String {
        let mut out = String::from("Name,Measurement Unit,Amount\n");
        for item in &self.items {
            out.push_str(&format!(
                "\"{}\",\"{}\",{}\n",
                escape_csv(&item.name),
                escape_csv(&item.measurement_unit),
                item.amount
            ));
        }
        out
    }

    pub fn render(&self, format: ListFormat) -> AppResult<String> {
        match format {
            ListFormat::Txt => Ok(self.render_text()),
            ListFormat::Csv => Ok(self.render_csv()),
            ListFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize shopping list: {}", e))),
        }
    }
}

fn escape_csv(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['"', '"'],
            c if c.is_control() => vec![' '],
            c => vec![c],
        })
        .collect()
}
