// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Health, options and the market
// endpoints are public. `POST /analysis` spends backend credits and requires a
// valid Bearer token checked via the `AuthBearer` extractor.
//
// Every failure is returned as `{"error": "<plain message>"}`; internals are
// logged, never echoed.
//
// CORS is configured permissively; tighten it in front of a public deployment.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::auth::AuthBearer;
use crate::app_state::{AppState, LoadedMarket};
use crate::error::{AnalysisError, DataError, FetchError};
use crate::indicators::compute_indicators;
use crate::market_data::fetch_ohlcv;
use crate::snapshot::summarize;
use crate::types::{Backend, Interval, Period};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/options", get(options))
        .route("/api/v1/market/load", post(load_market))
        .route("/api/v1/market/:ticker", get(market_view))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/analysis", post(analysis))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

/// A failed request: status code plus a message safe to show a user.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        let status = match err {
            DataError::EmptyTable | DataError::NoUsableRows { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidTicker => Self::bad_request(err.to_string()),
            FetchError::Data(data) => data.into(),
            FetchError::Provider(ref description) => {
                Self::new(StatusCode::NOT_FOUND, description.clone())
            }
            FetchError::Status { status, .. } => {
                warn!(error = %err, "market data provider failure");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    format!("market data provider returned status {status}"),
                )
            }
            FetchError::Http(_) | FetchError::Malformed(_) => {
                warn!(error = %err, "market data request failed");
                Self::new(StatusCode::BAD_GATEWAY, "market data request failed")
            }
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        let status = match err {
            AnalysisError::MissingCredential(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::SafetyBlocked => StatusCode::UNPROCESSABLE_ENTITY,
            AnalysisError::Connectivity { .. } => StatusCode::GATEWAY_TIMEOUT,
            AnalysisError::Auth { .. } | AnalysisError::EmptyResponse => StatusCode::BAD_GATEWAY,
            AnalysisError::Backend { ref backend, .. } => {
                warn!(error = %err, "analysis backend failure");
                return Self::new(StatusCode::BAD_GATEWAY, format!("{backend} request failed"));
            }
        };
        Self::new(status, err.to_string())
    }
}

// =============================================================================
// Health (public)
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    uptime_secs: u64,
    loaded_tickers: Vec<String>,
    backends: Vec<Backend>,
    analyses_served: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: Utc::now().timestamp_millis(),
        uptime_secs: state.uptime_secs(),
        loaded_tickers: state.loaded_tickers(),
        backends: state.analysts.available(),
        analyses_served: state
            .analyses_served
            .load(std::sync::atomic::Ordering::Relaxed),
    })
}

// =============================================================================
// Options (public)
// =============================================================================

#[derive(Serialize)]
struct OptionsResponse {
    periods: Vec<Period>,
    intervals: Vec<Interval>,
    backends: Vec<BackendOption>,
    defaults: Defaults,
}

#[derive(Serialize)]
struct BackendOption {
    id: Backend,
    label: String,
    available: bool,
}

#[derive(Serialize)]
struct Defaults {
    ticker: String,
    period: Period,
    interval: Interval,
    backend: Backend,
    question: String,
    max_output_tokens: u32,
}

async fn options(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let available = state.analysts.available();
    let config = state.config.read();

    Json(OptionsResponse {
        periods: Period::ALL.to_vec(),
        intervals: Interval::ALL.to_vec(),
        backends: Backend::ALL
            .into_iter()
            .map(|b| BackendOption {
                id: b,
                label: b.to_string(),
                available: available.contains(&b),
            })
            .collect(),
        defaults: Defaults {
            ticker: config.default_ticker.clone(),
            period: config.default_period,
            interval: config.default_interval,
            backend: config.default_backend,
            question: config.default_question.clone(),
            max_output_tokens: config.max_output_tokens,
        },
    })
}

// =============================================================================
// Market data (public)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct LoadRequest {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    interval: Option<String>,
}

/// `Some(non-blank)` parsed, otherwise the fallback.
fn parse_or<T: std::str::FromStr<Err = String>>(value: Option<&str>, fallback: T) -> Result<T, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map_err(ApiError::bad_request),
        None => Ok(fallback),
    }
}

async fn load_market(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let (ticker, period, interval, bars_in_view, rows_in_view) = {
        let config = state.config.read();
        let ticker = req
            .ticker
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(config.default_ticker.as_str())
            .to_string();
        (
            ticker,
            parse_or(req.period.as_deref(), config.default_period)?,
            parse_or(req.interval.as_deref(), config.default_interval)?,
            config.bars_in_view,
            config.indicator_rows_in_view,
        )
    };

    let ohlcv = fetch_ohlcv(state.market.as_ref(), &ticker, period, interval).await?;
    let enriched = compute_indicators(&ohlcv)?;

    let loaded = state.store_market(LoadedMarket {
        ticker: ticker.to_uppercase(),
        period,
        interval,
        ohlcv: Arc::new(ohlcv),
        enriched: Arc::new(enriched),
        loaded_at: Utc::now(),
    });

    info!(ticker = %loaded.ticker, %period, %interval, rows = loaded.ohlcv.len(), "market loaded");
    Ok(Json(loaded.view(bars_in_view, rows_in_view)))
}

async fn market_view(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let loaded = state.market_for(&ticker).ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            format!("No market data loaded for {}", ticker.trim().to_uppercase()),
        )
    })?;

    let config = state.config.read();
    Ok(Json(loaded.view(config.bars_in_view, config.indicator_rows_in_view)))
}

// =============================================================================
// Analysis (authenticated)
// =============================================================================

#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    ticker: String,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    backend: Option<String>,
    #[serde(default)]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    id: Uuid,
    ticker: String,
    backend: Backend,
    question: String,
    prompt: String,
    analysis: String,
}

async fn analysis(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    if req.ticker.trim().is_empty() {
        return Err(ApiError::bad_request("ticker must not be empty"));
    }

    let (backend, question, max_output_tokens) = {
        let config = state.config.read();
        let question = req
            .question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(config.default_question.as_str())
            .to_string();
        (
            parse_or(req.backend.as_deref(), config.default_backend)?,
            question,
            req.max_output_tokens.unwrap_or(config.max_output_tokens),
        )
    };

    if max_output_tokens == 0 {
        return Err(ApiError::bad_request("max_output_tokens must be positive"));
    }

    let loaded = state
        .market_for(&req.ticker)
        .ok_or_else(|| ApiError::new(StatusCode::CONFLICT, "Load market data first"))?;

    let prompt = summarize(&loaded.ohlcv, &loaded.enriched, &loaded.ticker)?;
    let client = state.analysts.get(backend)?;
    let analysis = client.generate(&prompt, &question, max_output_tokens).await?;

    let served = state.record_analysis();
    info!(ticker = %loaded.ticker, %backend, served, "analysis generated");

    Ok(Json(AnalysisResponse {
        id: Uuid::new_v4(),
        ticker: loaded.ticker.clone(),
        backend,
        question,
        prompt,
        analysis,
    }))
}

// =============================================================================
// Tests
// =============================================================================
