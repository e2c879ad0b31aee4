// =============================================================================
// Central Application State — Market Analyst
// =============================================================================
//
// Ties the service together: configuration, the market-data source, the
// analysis backends and every instrument loaded so far. Shared across all
// request handlers via `Arc<AppState>`.
//
// Thread safety:
//   - parking_lot::RwLock for the config and the loaded-market map.
//   - Loaded tables are immutable once computed and shared behind `Arc`.
//   - No lock is held across an `.await`.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::analysis::AnalystRegistry;
use crate::indicators::{EnrichedRow, EnrichedTable};
use crate::market_data::{Bar, MarketDataSource, OhlcvTable};
use crate::runtime_config::AppConfig;
use crate::types::{Interval, Period};

// =============================================================================
// Loaded market
// =============================================================================

/// One instrument's history and derived columns, as last loaded.
#[derive(Debug, Clone)]
pub struct LoadedMarket {
    pub ticker: String,
    pub period: Period,
    pub interval: Interval,
    pub ohlcv: Arc<OhlcvTable>,
    pub enriched: Arc<EnrichedTable>,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedMarket {
    /// The most recent `bars` bars and `indicator_rows` enriched rows.
    pub fn view(&self, bars: usize, indicator_rows: usize) -> MarketView {
        MarketView {
            ticker: self.ticker.clone(),
            period: self.period,
            interval: self.interval,
            rows: self.ohlcv.len(),
            utc_offset_secs: self.ohlcv.utc_offset().local_minus_utc(),
            loaded_at: self.loaded_at.to_rfc3339(),
            bars: self.ohlcv.tail(bars).to_vec(),
            indicators: self.enriched.tail(indicator_rows),
        }
    }
}

/// Serialisable window over a [`LoadedMarket`].
#[derive(Debug, Clone, Serialize)]
pub struct MarketView {
    pub ticker: String,
    pub period: Period,
    pub interval: Interval,
    pub rows: usize,
    /// Exchange offset from UTC; bar timestamps are UTC.
    pub utc_offset_secs: i32,
    pub loaded_at: String,
    pub bars: Vec<Bar>,
    pub indicators: Vec<EnrichedRow>,
}

// =============================================================================
// AppState
// =============================================================================

/// Central application state shared across all handlers via `Arc<AppState>`.
pub struct AppState {
    // ── Configuration ───────────────────────────────────────────────────
    pub config: RwLock<AppConfig>,

    /// Expected bearer token for protected endpoints; `None` rejects them all.
    pub api_token: Option<String>,

    // ── Providers ───────────────────────────────────────────────────────
    pub market: Arc<dyn MarketDataSource>,
    pub analysts: AnalystRegistry,

    // ── Loaded instruments (keyed by upper-cased ticker) ────────────────
    loaded: RwLock<HashMap<String, Arc<LoadedMarket>>>,

    // ── Counters ────────────────────────────────────────────────────────
    pub analyses_served: AtomicU64,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        market: Arc<dyn MarketDataSource>,
        analysts: AnalystRegistry,
        api_token: Option<String>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            api_token: api_token.filter(|t| !t.trim().is_empty()),
            market,
            analysts,
            loaded: RwLock::new(HashMap::new()),
            analyses_served: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Loaded markets ──────────────────────────────────────────────────

    /// Store (or replace) a loaded instrument.
    pub fn store_market(&self, market: LoadedMarket) -> Arc<LoadedMarket> {
        let market = Arc::new(market);
        self.loaded
            .write()
            .insert(ticker_key(&market.ticker), market.clone());
        market
    }

    /// The last load for `ticker`, matched case-insensitively.
    pub fn market_for(&self, ticker: &str) -> Option<Arc<LoadedMarket>> {
        self.loaded.read().get(&ticker_key(ticker)).cloned()
    }

    /// Tickers loaded so far, sorted.
    pub fn loaded_tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.loaded.read().keys().cloned().collect();
        tickers.sort();
        tickers
    }

    // ── Counters ────────────────────────────────────────────────────────

    pub fn record_analysis(&self) -> u64 {
        self.analyses_served.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

fn ticker_key(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

// =============================================================================
// Tests
// =============================================================================
