use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Opens (and creates, if missing) the SQLite database behind `url`.
///
/// Every pooled connection gets `foreign_keys=ON`; the cascade and
/// `SET NULL` rules of the schema depend on it.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Column named by a SQLite `UNIQUE constraint failed: table.column` error.
pub fn unique_violation_column(err: &sqlx::Error) -> Option<String> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.is_unique_violation() {
        return None;
    }
    let detail = db_err.message().strip_prefix("UNIQUE constraint failed: ")?;
    let first = detail.split(',').next()?.trim();
    first.rsplit('.').next().map(str::to_string)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;

    let tables = [
        r#"CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            username TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            is_staff INTEGER NOT NULL DEFAULT 0,
            date_joined TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
        r#"CREATE TABLE IF NOT EXISTS auth_tokens (
            key TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS subscriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            UNIQUE(user_id, author_id),
            CHECK(user_id <> author_id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(author_id) REFERENCES users(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            color TEXT NOT NULL UNIQUE COLLATE NOCASE,
            slug TEXT NOT NULL UNIQUE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            measurement_unit TEXT NOT NULL,
            UNIQUE(name, measurement_unit)
        )"#,
        r#"CREATE TABLE IF NOT EXISTS recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id INTEGER NULL,
            name TEXT NOT NULL UNIQUE,
            text TEXT NOT NULL,
            image TEXT NULL,
            cooking_time INTEGER NOT NULL CHECK(cooking_time >= 1),
            pub_date TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            FOREIGN KEY(author_id) REFERENCES users(id) ON DELETE SET NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS recipe_tags (
            recipe_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY(recipe_id, tag_id),
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
            FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS recipe_ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id INTEGER NOT NULL,
            ingredient_id INTEGER NOT NULL,
            amount INTEGER NOT NULL CHECK(amount >= 1),
            UNIQUE(ingredient_id, recipe_id),
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE,
            FOREIGN KEY(ingredient_id) REFERENCES ingredients(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS favorites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            recipe_id INTEGER NOT NULL,
            UNIQUE(user_id, recipe_id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE
        )"#,
        r#"CREATE TABLE IF NOT EXISTS shopping_cart (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            recipe_id INTEGER NOT NULL,
            UNIQUE(user_id, recipe_id),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(recipe_id) REFERENCES recipes(id) ON DELETE CASCADE
        )"#,
    ];
    for ddl in tables {
        sqlx::query(ddl).execute(pool).await?;
    }

    let indexes = [
        ("idx_recipes_pub_date", "CREATE INDEX IF NOT EXISTS idx_recipes_pub_date ON recipes(pub_date DESC, id DESC)"),
        ("idx_recipes_author", "CREATE INDEX IF NOT EXISTS idx_recipes_author ON recipes(author_id)"),
        ("idx_recipe_tags_tag", "CREATE INDEX IF NOT EXISTS idx_recipe_tags_tag ON recipe_tags(tag_id)"),
        ("idx_recipe_ingredients_recipe", "CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id)"),
        ("idx_ingredients_name", "CREATE INDEX IF NOT EXISTS idx_ingredients_name ON ingredients(name COLLATE NOCASE)"),
        ("idx_subscriptions_author", "CREATE INDEX IF NOT EXISTS idx_subscriptions_author ON subscriptions(author_id)"),
        ("idx_favorites_recipe", "CREATE INDEX IF NOT EXISTS idx_favorites_recipe ON favorites(recipe_id)"),
        ("idx_shopping_cart_recipe", "CREATE INDEX IF NOT EXISTS idx_shopping_cart_recipe ON shopping_cart(recipe_id)"),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}
