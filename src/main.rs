// =============================================================================
// Market Analyst — Main Entry Point
// =============================================================================
//
// Loads configuration and credentials, wires the market-data source and the
// analysis backends into shared state, then serves the REST API until Ctrl-C.
// Backends without a credential stay disabled; requests naming them fail with
// a message pointing at the missing variable.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use market_analyst::analysis::{AnalystRegistry, Credentials};
use market_analyst::api;
use market_analyst::api::auth::API_TOKEN_VAR;
use market_analyst::app_state::AppState;
use market_analyst::market_data::YahooClient;
use market_analyst::runtime_config::AppConfig;
use market_analyst::types::Backend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Market Analyst starting up");

    let config_path =
        std::env::var("ANALYST_CONFIG").unwrap_or_else(|_| "analyst_config.json".into());
    let mut config = AppConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Ok(raw) = std::env::var("ANALYST_BACKEND") {
        match raw.parse::<Backend>() {
            Ok(backend) => config.default_backend = backend,
            Err(e) => warn!(error = %e, "Ignoring ANALYST_BACKEND"),
        }
    }

    info!(
        ticker = %config.default_ticker,
        period = %config.default_period,
        interval = %config.default_interval,
        backend = %config.default_backend,
        "Defaults configured"
    );

    // ── 2. Providers ─────────────────────────────────────────────────────
    let credentials = Credentials::from_env();
    let analysts = AnalystRegistry::from_credentials(&credentials, &config.analysis_settings())
        .context("failed to build analysis clients")?;
    if credentials.key_for(config.default_backend).is_none() {
        warn!(
            backend = %config.default_backend,
            var = config.default_backend.credential_var(),
            "Default backend has no credential"
        );
    }

    let market = YahooClient::new(config.request_timeout_secs)
        .context("failed to build market data client")?;

    let api_token = std::env::var(API_TOKEN_VAR).ok();
    if api_token.is_none() {
        warn!("{API_TOKEN_VAR} is not set; POST /api/v1/analysis will reject every request");
    }

    // ── 3. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config, Arc::new(market), analysts, api_token));

    // ── 4. Start the API server ──────────────────────────────────────────
    let bind_addr =
        std::env::var("ANALYST_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    info!("Market Analyst stopped");
    Ok(())
}

// ── Graceful shutdown ────────────────────────────────────────────────────
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
