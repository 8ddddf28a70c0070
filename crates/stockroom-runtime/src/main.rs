//! # Stockroom Server Runtime
//!
//! The main entry point for the Stockroom backend.
//!
//! ## Startup order
//!
//! 1. Read environment configuration
//! 2. Open the database and apply forward migrations
//! 3. Run one-shot setup if credentials are provided and setup is pending
//! 4. Build the gateway state and router
//! 5. Spawn the stale-reservation and session sweepers
//! 6. Serve until SIGINT

use anyhow::{Context, Result};
use std::net::SocketAddr;
use stockroom_gateway::{router, AppState};
use stockroom_store::{migrations, Database};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod sweepers;

use config::RuntimeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = RuntimeConfig::from_env()?;
    info!(db = %config.db_path, bind = %config.gateway.bind_addr(), "starting stockroom");

    let db = Database::open(&config.db_path).context("opening database")?;
    migrations::migrate(&db).context("applying migrations")?;

    let state = AppState::build(db, config.gateway.clone(), config.root_key.clone())
        .context("wiring state")?;

    if let Some((username, password)) = config.setup_credentials() {
        match state.auth.initial_setup(username, password) {
            Ok(()) => info!("initial setup ran"),
            Err(stockroom_gateway::auth::AuthError::SetupComplete) => {
                info!("setup already complete; ignoring setup credentials")
            }
            Err(e) => return Err(e).context("initial setup"),
        }
    }

    sweepers::spawn(&state);

    let listener = tokio::net::TcpListener::bind(config.gateway.bind_addr())
        .await
        .context("binding listener")?;
    info!("listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not install signal handler");
    }
}
