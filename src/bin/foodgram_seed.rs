//! Loads reference data into the Foodgram database.
//!
//! ```text
//! foodgram-seed tags
//! foodgram-seed ingredients data/ingredients.csv
//! foodgram-seed staff admin@example.com
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use foodgram::{config, db, seed};

#[derive(Parser, Debug)]
#[command(name = "foodgram-seed", author, version, about = "Loads reference data into the Foodgram database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Insert the default tags, skipping existing ones
    Tags,
    /// Load `name,measurement_unit` rows from a CSV file
    Ingredients { file: PathBuf },
    /// Grant staff rights to an existing user
    Staff { email: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let app_cfg = config::load()?;
    config::ensure_sqlite_parent_dir(&app_cfg.database.url)?;
    let pool = db::connect(&app_cfg.database.url, app_cfg.database.max_connections).await?;
    db::init_db(&pool).await?;

    match cli.command {
        Command::Tags => {
            let added = seed::seed_tags(&pool).await?;
            println!("Default tags loaded ({} new)", added);
        }
        Command::Ingredients { file } => {
            let added = seed::load_ingredients(&pool, &file).await?;
            println!("Ingredients loaded from {} ({} new)", file.display(), added);
        }
        Command::Staff { email } => {
            seed::grant_staff(&pool, &email).await?;
            println!("{} is now staff", email);
        }
    }

    pool.close().await;
    Ok(())
}
