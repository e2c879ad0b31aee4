// =============================================================================
// Error types
// =============================================================================
//
// Three failure domains:
//   DataError     — precondition violations on price tables (normalizer,
//                   indicator engine, snapshot summarizer).
//   FetchError    — the market-data provider boundary.
//   AnalysisError — the text-generation backend boundary.
//
// Short history is never an error: indicators degrade to `None` cells.
// =============================================================================

use thiserror::Error;

/// Failures of the OHLCV table contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// Zero usable bars.
    #[error("no data returned; try a longer period or a different interval")]
    EmptyTable,

    /// Every row was dropped by cleaning.
    #[error("no usable closing prices after cleaning ({dropped} rows dropped)")]
    NoUsableRows { dropped: usize },

    /// A required column could not be resolved from any known alias.
    #[error("missing required columns {missing:?}; columns available: {available:?}")]
    Schema {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// Bars are not strictly increasing by timestamp.
    #[error("bar {index} is not strictly after the previous bar")]
    OutOfOrder { index: usize },

    /// A bar carries a non-finite price or a negative/non-finite volume.
    #[error("bar {index} has a non-finite price or invalid volume")]
    InvalidBar { index: usize },
}

/// Failures while retrieving raw bars from the market-data provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("ticker must not be empty")]
    InvalidTicker,

    #[error("market data request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("market data provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("market data provider error: {0}")]
    Provider(String),

    #[error("malformed market data response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Failures of the text-generation backend.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("connection error while contacting {backend}; check that this machine can reach the API")]
    Connectivity { backend: String },

    #[error("{0} is not set; export it as an environment variable or add it to .env")]
    MissingCredential(String),

    #[error("{backend} rejected the configured credentials")]
    Auth { backend: String },

    #[error("the request was blocked by the backend's safety filters; make the question more general and educational")]
    SafetyBlocked,

    #[error("the backend did not return any text")]
    EmptyResponse,

    #[error("{backend} request failed: {message}")]
    Backend { backend: String, message: String },
}
