//! Mathpad - a math notebook with reasoning checks.
//!
//! Entry point for the web server. Configuration comes from the environment
//! (see `config`); logging is controlled with `RUST_LOG`.

use mathpad::{config::Config, router, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mathpad=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let state = match AppState::new(config.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, db = %config.db_path.display(), "failed to open notebook store");
            std::process::exit(1);
        }
    };

    let listener = tokio::net::TcpListener::bind(config.bind.as_str())
        .await
        .expect("Failed to bind listen address");

    tracing::info!(address = %config.bind, "mathpad server running");
    tracing::info!(model = %config.model, endpoint = %config.api_url, "reasoning service");
    if config.api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY is not set; checks and hints will fail");
    }
    if config.demo_mode {
        tracing::info!("demo mode: notebook changes are not persisted");
    }

    axum::serve(listener, router(state))
        .await
        .expect("Server error");
}
