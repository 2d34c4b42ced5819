mod config;

use std::sync::Arc;

use tracing::{info, warn};

use swopp_api::{AppState, AppStateInner, auth::hash_password};
use swopp_core::Swopp;
use swopp_core::storage::DiskImageStore;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swopp=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and image storage
    let db = swopp_db::Database::open(&config.db_path)?;
    let images = DiskImageStore::new(config.image_dir.clone()).await?;
    let swopp = Swopp::new(Arc::new(db), Arc::new(images), config.policy.clone());

    if let Some((email, password)) = &config.admin {
        swopp_core::users::validate_password(password)?;
        if swopp.ensure_admin(email, "Administrator", hash_password(password)?).await? {
            info!("Seeded admin account {}", email);
        }
    }

    let state: AppState = Arc::new(AppStateInner {
        swopp,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
    });

    if !config.public_reads {
        info!("Read endpoints require authentication");
    }
    let app = swopp_api::router(state, config.public_reads);

    info!("Swopp server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Swopp server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
