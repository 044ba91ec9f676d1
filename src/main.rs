use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use tokio::time::{self, Duration as TokioDuration};
use tokio_util::sync::CancellationToken;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foodgram::{config, db, middleware, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging (stdout + daily rotated file under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "foodgram.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard);

    // Configuration (embedded defaults -> foodgram.toml -> env/.env)
    let app_cfg = config::load()?;

    let db_url = &app_cfg.database.url;
    config::ensure_sqlite_parent_dir(db_url)?;
    info!("Opening SQLite database at {}", db_url);
    let pool = db::connect(db_url, app_cfg.database.max_connections).await?;
    db::init_db(&pool).await?;

    std::fs::create_dir_all(&app_cfg.media.root)?;

    let state = AppState::new(pool.clone(), app_cfg.clone());

    // Periodic cleanup of per-endpoint rate limiters to bound memory
    let shutdown = CancellationToken::new();
    let cleanup = {
        let rl = state.rate_limiter.clone();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(TokioDuration::from_secs(300));
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => rl.cleanup_all().await,
                }
            }
        })
    };

    let app = routes::router(state)
        // Global body limit, shared with the validation middleware
        .layer(DefaultBodyLimit::max(middleware::validation::max_body_size()))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // CORS: permissive in debug builds for a separately served frontend
    let app = if cfg!(debug_assertions) { app.layer(CorsLayer::permissive()) } else { app };

    let port: u16 = app_cfg.server.port;
    let host: String = app_cfg.server.host.clone();
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Foodgram listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    let _ = cleanup.await;
    pool.close().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
