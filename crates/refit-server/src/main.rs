mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use refit_api::AppStateInner;
use refit_db::{ConnectionRegistry, Database};
use refit_types::api::DbTarget;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refit=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let local = Database::open(&config.db_path)?;
    let production = config
        .production_db_path
        .as_deref()
        .map(Database::open)
        .transpose()?;
    let databases = ConnectionRegistry::new(local, production);
    if !databases.is_dedicated(DbTarget::Production) {
        info!("No production database configured, admin requests for it use the local one");
    }
    if config.admin_enabled {
        warn!("Admin table browser is enabled");
    }

    let state = Arc::new(AppStateInner {
        databases,
        jwt_secret: config.jwt_secret.clone(),
        admin_enabled: config.admin_enabled,
    });

    let app = refit_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Refit server listening on {}", addr);

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
                warn!("Failed to install SIGTERM handler: {}", e);
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
