//! Reference-data loading used by the `foodgram-seed` binary.

use std::path::Path;

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("No user with email {0}")]
    UserNotFound(String),
}

pub type Result<T> = std::result::Result<T, SeedError>;

/// `(name, color, slug)` of the tags every installation starts with.
pub const DEFAULT_TAGS: [(&str, &str, &str); 5] = [
    ("Breakfast", "#E26C2D", "breakfast"),
    ("Lunch", "#49B64E", "dinner"),
    ("Dinner", "#8775D2", "supper"),
    ("Sweets", "#C9A2BF", "sweet"),
    ("Spicy", "#CC0000", "sharp"),
];

/// Inserts the default tags, skipping any that clash with existing ones.
/// Returns how many were added.
pub async fn seed_tags(db: &SqlitePool) -> Result<u64> {
    let mut added = 0;
    for (name, color, slug) in DEFAULT_TAGS {
        added += sqlx::query("INSERT OR IGNORE INTO tags (name, color, slug) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(color)
            .bind(slug)
            .execute(db)
            .await?
            .rows_affected();
    }
    Ok(added)
}

/// Parses `name,measurement_unit` rows. A leading header row is skipped,
/// fields may be double-quoted (with `""` as an escaped quote), blank lines
/// are ignored.
pub fn parse_ingredients_csv(text: &str) -> Result<Vec<(String, String)>> {
    let mut rows = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let raw = raw.trim_end_matches('\r');
        if raw.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(raw).map_err(|message| SeedError::Csv { line: line_no, message })?;
        if fields.len() != 2 {
            return Err(SeedError::Csv {
                line: line_no,
                message: format!("expected 2 fields, found {}", fields.len()),
            });
        }
        let name = fields[0].trim().to_string();
        let unit = fields[1].trim().to_string();
        if rows.is_empty() && name.eq_ignore_ascii_case("name") && unit.eq_ignore_ascii_case("measurement_unit") {
            continue;
        }
        if name.is_empty() || unit.is_empty() {
            return Err(SeedError::Csv { line: line_no, message: "empty name or unit".into() });
        }
        rows.push((name, unit));
    }
    Ok(rows)
}

fn split_csv_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' if in_quotes => in_quotes = false,
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".into());
    }
    fields.push(current);
    Ok(fields)
}

/// Loads an ingredient CSV; duplicates of existing rows are skipped.
/// Returns how many were added.
pub async fn load_ingredients(db: &SqlitePool, path: &Path) -> Result<u64> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read { path: path.display().to_string(), source })?;
    let rows = parse_ingredients_csv(&text)?;

    let mut tx = db.begin().await?;
    let mut added = 0;
    for (name, unit) in &rows {
        added += sqlx::query("INSERT OR IGNORE INTO ingredients (name, measurement_unit) VALUES (?1, ?2)")
            .bind(name)
            .bind(unit)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    tracing::info!(rows = rows.len(), added, "Ingredients loaded");
    Ok(added)
}

pub async fn grant_staff(db: &SqlitePool, email: &str) -> Result<()> {
    let updated = sqlx::query("UPDATE users SET is_staff = 1 WHERE email = ?1")
        .bind(email.trim())
        .execute(db)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(SeedError::UserNotFound(email.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_header_and_quotes() {
        let csv = "name,measurement_unit\nsugar,g\n\"salt, sea\",g\n\n\"\"\"Bio\"\" oats\",kg\r\n";
        let rows = parse_ingredients_csv(csv).unwrap();
        assert_eq!(
            rows,
            vec![
                ("sugar".to_string(), "g".to_string()),
                ("salt, sea".to_string(), "g".to_string()),
                ("\"Bio\" oats".to_string(), "kg".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_without_header() {
        let rows = parse_ingredients_csv("milk,ml\neggs,pcs").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "milk");
    }

    #[test]
    fn test_parse_reports_line() {
        match parse_ingredients_csv("milk,ml\nbroken\n") {
            Err(SeedError::Csv { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(parse_ingredients_csv("\"open,ml"), Err(SeedError::Csv { line: 1, .. })));
    }

    #[tokio::test]
    async fn test_seed_tags_is_idempotent() {
        let db = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        crate::db::init_db(&db).await.unwrap();
        assert_eq!(seed_tags(&db).await.unwrap(), 5);
        assert_eq!(seed_tags(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_ingredients_skips_duplicates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ingredients.csv");
        std::fs::write(&path, "name,measurement_unit\nflour,g\nflour,g\nflour,kg\n").unwrap();

        let db = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        crate::db::init_db(&db).await.unwrap();
        assert_eq!(load_ingredients(&db, &path).await.unwrap(), 2);
        assert_eq!(load_ingredients(&db, &path).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_grant_staff_unknown_user() {
        let db = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        crate::db::init_db(&db).await.unwrap();
        assert!(matches!(grant_staff(&db, "nobody@example.com").await, Err(SeedError::UserNotFound(_))));
    }
}
