use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Default page size when the client sends no `limit`.
    pub page_size: i64,
    pub max_page_size: i64,
    /// How many recipes are embedded per author in the subscriptions list.
    pub recipes_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory on disk where uploaded images are written.
    pub root: String,
    /// Public prefix under which `root` is served, e.g. `/media/`.
    pub url_prefix: String,
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pagination: PaginationConfig,
    pub media: MediaConfig,
    pub security: Option<SecurityConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        // Mirror defaults from config/default.toml
        Self { page_size: 6, max_page_size: 100, recipes_limit: 3 }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        // Optional local file: foodgram.toml (in CWD)
        .add_source(::config::File::with_name("foodgram").required(false));

    if let Ok(custom_path) = std::env::var("FOODGRAM_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("FOODGRAM").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    // Database
    if cfg.database.url.trim().is_empty() {
        return Err(anyhow::anyhow!("database.url must not be empty"));
    }
    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    // Pagination
    let p = &cfg.pagination;
    if p.page_size <= 0 {
        return Err(anyhow::anyhow!("pagination.page_size must be > 0"));
    }
    if p.max_page_size < p.page_size {
        return Err(anyhow::anyhow!("pagination.max_page_size must be >= page_size"));
    }
    if p.recipes_limit < 0 {
        return Err(anyhow::anyhow!("pagination.recipes_limit must be >= 0"));
    }

    // Media
    if cfg.media.root.trim().is_empty() {
        return Err(anyhow::anyhow!("media.root must not be empty"));
    }
    let prefix = &cfg.media.url_prefix;
    if prefix.len() < 3 || !prefix.starts_with('/') || !prefix.ends_with('/') {
        return Err(anyhow::anyhow!("media.url_prefix must look like '/media/'"));
    }
    if cfg.media.max_image_bytes == 0 {
        return Err(anyhow::anyhow!("media.max_image_bytes must be > 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
