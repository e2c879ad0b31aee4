// =============================================================================
// Market Analyst — price history, technical indicators, LLM commentary
// =============================================================================
//
// Pipeline:
//   market_data  — fetch raw history and normalize it into an OhlcvTable
//   indicators   — derive SMA/EMA/RSI/MACD/volatility columns
//   snapshot     — render the latest bar and indicators as prompt text
//   analysis     — ask an OpenAI or Gemini backend for commentary
//   api          — axum REST surface over the above
// =============================================================================

pub mod analysis;
pub mod api;
pub mod app_state;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod runtime_config;
pub mod snapshot;
pub mod types;

pub use analysis::{AnalysisClient, AnalystRegistry, Credentials};
pub use error::{AnalysisError, DataError, FetchError};
pub use indicators::{compute_indicators, EnrichedTable};
pub use market_data::{fetch_ohlcv, Bar, MarketDataSource, OhlcvTable};
pub use snapshot::{combine, latest_raw_snapshot, latest_technical_snapshot, summarize};
