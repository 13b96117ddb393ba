//! Tidings Server — application entry point.

mod config;
mod routes;
mod state;
mod ws;

use std::process::ExitCode;

use thiserror::Error;
use tidings_auth::{AuthError, SigningKey};
use tidings_core::error::TidingsError;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServerConfig};
use crate::state::AppState;

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Core(#[from] TidingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tidings=info")),
        )
        .json()
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Tidings server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = ServerConfig::from_env()?;
    info!(bind = %config.bind, environment = ?config.environment, "Starting Tidings server...");

    let key = SigningKey::from_config(
        config.jwt_secret.as_deref(),
        config.environment.allows_ephemeral_key(),
    )?;
    info!(key_fingerprint = key.fingerprint(), "signing key loaded");

    let state = AppState::build(&config, key)?;
    if let Some(demo) = &config.demo_user {
        state.seed_demo_user(demo).await?;
    }

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Tidings server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
