use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use galeries_api::{AppState, AppStateInner};
use galeries_db::Database;
use galeries_server::config::{Config, JwtConfig};
use galeries_server::seed::seed_super_admin;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "galeries=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set GALERIES_JWT_PRIVATE_KEY/GALERIES_JWT_PUBLIC_KEY or a real");
            eprintln!("       GALERIES_JWT_SECRET in your .env file and restart.");
            std::process::exit(1);
        }
    };
    if matches!(config.jwt, JwtConfig::Secret(_)) {
        info!("Signing tokens with HS256 shared secret (development mode)");
    }

    let keys = config.jwt.load_keys()?;
    let db = Database::open(&config.db_path)?;

    if let Some(seed) = &config.admin {
        seed_super_admin(&db, seed)?;
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        keys,
        secure_cookies: config.secure_cookies,
    });

    let app = galeries_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Galeries server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
