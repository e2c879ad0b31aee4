pub mod normalizer;
pub mod ohlcv;
pub mod yahoo;

use async_trait::async_trait;
use tracing::info;

use crate::error::FetchError;
use crate::types::{Interval, Period};

// Re-export the table types for convenient access (e.g. `use crate::market_data::Bar`).
pub use normalizer::{normalize, RawColumn, RawFrame};
pub use ohlcv::{Bar, OhlcvTable};
pub use yahoo::YahooClient;

/// A provider of raw price history for one instrument.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_raw(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<RawFrame, FetchError>;
}

/// Fetch and normalize history for `ticker`.
pub async fn fetch_ohlcv(
    source: &dyn MarketDataSource,
    ticker: &str,
    period: Period,
    interval: Interval,
) -> Result<OhlcvTable, FetchError> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(FetchError::InvalidTicker);
    }

    let frame = source.fetch_raw(ticker, period, interval).await?;
    let table = normalize(&frame)?;

    info!(
        ticker,
        %period,
        %interval,
        rows = table.len(),
        "market data loaded"
    );
    Ok(table)
}
