// =============================================================================
// Indicator Engine — OHLCV table -> Enriched table
// =============================================================================
//
// | column        | definition                         | first defined |
// |---------------|------------------------------------|---------------|
// | sma_20        | rolling_mean(close, 20, min 5)     | 4             |
// | sma_50        | rolling_mean(close, 50, min 10)    | 9             |
// | ema_20        | ewm_mean(close, span 20)           | 0             |
// | rsi_14        | simple-average RSI(14)             | 14            |
// | macd (+sig)   | EMA12 - EMA26, EMA9 of that        | 0             |
// | returns       | pct_change(close)                  | 1             |
// | volatility_20 | rolling_std(returns, 20, min 5)    | 5             |
//
// Pure and deterministic: identical input yields bit-identical columns.
// =============================================================================

use serde::Serialize;
use tracing::debug;

use super::macd::standard_macd;
use super::rsi::calculate_rsi;
use super::series::{defined, ewm_mean, pct_change, rolling_mean, rolling_std};
use crate::error::DataError;
use crate::market_data::{Bar, OhlcvTable};

/// A derived column of the enriched table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Sma20,
    Sma50,
    Ema20,
    Rsi14,
    Macd,
    MacdSignal,
    MacdHist,
    Returns,
    Volatility20,
}

impl Indicator {
    pub const ALL: [Indicator; 9] = [
        Self::Sma20,
        Self::Sma50,
        Self::Ema20,
        Self::Rsi14,
        Self::Macd,
        Self::MacdSignal,
        Self::MacdHist,
        Self::Returns,
        Self::Volatility20,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Sma20 => "sma_20",
            Self::Sma50 => "sma_50",
            Self::Ema20 => "ema_20",
            Self::Rsi14 => "rsi_14",
            Self::Macd => "macd",
            Self::MacdSignal => "macd_signal",
            Self::MacdHist => "macd_hist",
            Self::Returns => "returns",
            Self::Volatility20 => "volatility_20",
        }
    }
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Indicator values of one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub ema_20: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub returns: Option<f64>,
    pub volatility_20: Option<f64>,
}

/// A bar with its indicator row, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRow {
    #[serde(flatten)]
    pub bar: Bar,
    #[serde(flatten)]
    pub indicators: IndicatorRow,
}

// =============================================================================
// EnrichedTable
// =============================================================================

/// The OHLCV table plus derived columns, aligned by position.
///
/// Owns its copy of the bars and only hands out shared slices, so it cannot
/// change after [`compute_indicators`] returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedTable {
    bars: OhlcvTable,
    sma_20: Vec<Option<f64>>,
    sma_50: Vec<Option<f64>>,
    ema_20: Vec<Option<f64>>,
    rsi_14: Vec<Option<f64>>,
    macd: Vec<Option<f64>>,
    macd_signal: Vec<Option<f64>>,
    macd_hist: Vec<Option<f64>>,
    returns: Vec<Option<f64>>,
    volatility_20: Vec<Option<f64>>,
}

impl EnrichedTable {
    pub fn bars(&self) -> &OhlcvTable {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// One derived column.
    pub fn column(&self, indicator: Indicator) -> &[Option<f64>] {
        match indicator {
            Indicator::Sma20 => &self.sma_20,
            Indicator::Sma50 => &self.sma_50,
            Indicator::Ema20 => &self.ema_20,
            Indicator::Rsi14 => &self.rsi_14,
            Indicator::Macd => &self.macd,
            Indicator::MacdSignal => &self.macd_signal,
            Indicator::MacdHist => &self.macd_hist,
            Indicator::Returns => &self.returns,
            Indicator::Volatility20 => &self.volatility_20,
        }
    }

    /// Indicator values at position `index`.
    pub fn row(&self, index: usize) -> Option<IndicatorRow> {
        if index >= self.len() {
            return None;
        }
        Some(IndicatorRow {
            sma_20: self.sma_20[index],
            sma_50: self.sma_50[index],
            ema_20: self.ema_20[index],
            rsi_14: self.rsi_14[index],
            macd: self.macd[index],
            macd_signal: self.macd_signal[index],
            macd_hist: self.macd_hist[index],
            returns: self.returns[index],
            volatility_20: self.volatility_20[index],
        })
    }

    /// Indicator values at the latest bar.
    pub fn last_row(&self) -> Option<IndicatorRow> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }

    /// Every column undefined for every bar.
    #[cfg(test)]
    pub(crate) fn all_undefined(bars: OhlcvTable) -> Self {
        let blank = vec![None; bars.len()];
        Self {
            sma_20: blank.clone(),
            sma_50: blank.clone(),
            ema_20: blank.clone(),
            rsi_14: blank.clone(),
            macd: blank.clone(),
            macd_signal: blank.clone(),
            macd_hist: blank.clone(),
            returns: blank.clone(),
            volatility_20: blank,
            bars,
        }
    }

    /// The most recent `count` bars with their indicators (oldest-first).
    pub fn tail(&self, count: usize) -> Vec<EnrichedRow> {
        let start = self.len().saturating_sub(count);
        self.bars.bars()[start..]
            .iter()
            .enumerate()
            .filter_map(|(offset, bar)| {
                self.row(start + offset).map(|indicators| EnrichedRow {
                    bar: bar.clone(),
                    indicators,
                })
            })
            .collect()
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Derive every indicator column from `table`.
///
/// Fails only with [`DataError::EmptyTable`]. Short histories leave the
/// affected columns undefined instead of failing.
pub fn compute_indicators(table: &OhlcvTable) -> Result<EnrichedTable, DataError> {
    if table.is_empty() {
        return Err(DataError::EmptyTable);
    }

    let closes = table.closes();
    let close_series = defined(&closes);

    let sma_20 = rolling_mean(&close_series, 20, 5);
    let sma_50 = rolling_mean(&close_series, 50, 10);
    let ema_20 = ewm_mean(&close_series, 20);
    let rsi_14 = calculate_rsi(&closes, 14);
    let macd = standard_macd(&closes);
    let returns = pct_change(&close_series);
    let volatility_20 = rolling_std(&returns, 20, 5);

    debug!(
        bars = table.len(),
        rsi_defined = rsi_14.iter().flatten().count(),
        "indicators computed"
    );

    Ok(EnrichedTable {
        bars: table.clone(),
        sma_20,
        sma_50,
        ema_20,
        rsi_14,
        macd: macd.macd,
        macd_signal: macd.signal,
        macd_hist: macd.histogram,
        returns,
        volatility_20,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::ohlcv::tests::table_from_closes;

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 4.0 + i as f64 * 0.1)
            .collect()
    }

    fn first_defined(col: &[Option<f64>]) -> Option<usize> {
        col.iter().position(Option::is_some)
    }

    #[test]
    fn empty_table_is_rejected() {
        assert_eq!(
            compute_indicators(&OhlcvTable::default()),
            Err(DataError::EmptyTable)
        );
    }

    #[test]
    fn columns_align_with_bars() {
        let enriched = compute_indicators(&table_from_closes(&wavy(75))).unwrap();
        for indicator in Indicator::ALL {
            assert_eq!(enriched.column(indicator).len(), 75, "{indicator}");
        }
    }

    #[test]
    fn warm_up_indices() {
        let enriched = compute_indicators(&table_from_closes(&wavy(60))).unwrap();
        assert_eq!(first_defined(enriched.column(Indicator::Sma20)), Some(4));
        assert_eq!(first_defined(enriched.column(Indicator::Sma50)), Some(9));
        assert_eq!(first_defined(enriched.column(Indicator::Ema20)), Some(0));
        assert_eq!(first_defined(enriched.column(Indicator::Returns)), Some(1));
        assert_eq!(first_defined(enriched.column(Indicator::Volatility20)), Some(5));
        assert_eq!(first_defined(enriched.column(Indicator::Rsi14)), Some(14));
        assert_eq!(first_defined(enriched.column(Indicator::Macd)), Some(0));
        assert_eq!(first_defined(enriched.column(Indicator::MacdSignal)), Some(0));
        assert_eq!(first_defined(enriched.column(Indicator::MacdHist)), Some(0));
    }

    #[test]
    fn sma_20_matches_window_mean() {
        let closes = wavy(80);
        let enriched = compute_indicators(&table_from_closes(&closes)).unwrap();
        let sma = enriched.column(Indicator::Sma20);
        for i in 19..closes.len() {
            let expected = closes[i - 19..=i].iter().sum::<f64>() / 20.0;
            assert!((sma[i].unwrap() - expected).abs() < 1e-9, "index {i}");
        }
    }

    #[test]
    fn ema_20_follows_recurrence() {
        let closes = wavy(50);
        let enriched = compute_indicators(&table_from_closes(&closes)).unwrap();
        let ema = enriched.column(Indicator::Ema20);
        let alpha = 2.0 / 21.0;
        assert_eq!(ema[0], Some(closes[0]));
        for i in 1..closes.len() {
            let expected = alpha * closes[i] + (1.0 - alpha) * ema[i - 1].unwrap();
            assert!((ema[i].unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn volatility_20_is_sample_std_of_trailing_returns() {
        let closes = wavy(45);
        let enriched = compute_indicators(&table_from_closes(&closes)).unwrap();
        let last = closes.len() - 1;

        let returns: Vec<f64> = (last - 19..=last)
            .map(|i| closes[i] / closes[i - 1] - 1.0)
            .collect();
        let mean = returns.iter().sum::<f64>() / 20.0;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 19.0;

        let vol = enriched.column(Indicator::Volatility20)[last].unwrap();
        assert!((vol - var.sqrt()).abs() < 1e-12, "got {vol}, expected {}", var.sqrt());
    }

    #[test]
    fn macd_hist_is_exact_difference() {
        let enriched = compute_indicators(&table_from_closes(&wavy(90))).unwrap();
        for i in 0..enriched.len() {
            let row = enriched.row(i).unwrap();
            assert_eq!(row.macd_hist, Some(row.macd.unwrap() - row.macd_signal.unwrap()));
        }
    }

    #[test]
    fn rsi_within_bounds() {
        let closes: Vec<f64> = (0..120)
            .map(|i| 50.0 + ((i * 7919) % 23) as f64 - 11.0)
            .collect();
        let enriched = compute_indicators(&table_from_closes(&closes)).unwrap();
        for v in enriched.column(Indicator::Rsi14).iter().flatten() {
            assert!((0.0..=100.0).contains(v));
        }
    }

    #[test]
    fn idempotent_bit_identical() {
        let table = table_from_closes(&wavy(70));
        let a = compute_indicators(&table).unwrap();
        let b = compute_indicators(&table).unwrap();
        for indicator in Indicator::ALL {
            let bits = |col: &[Option<f64>]| -> Vec<Option<u64>> {
                col.iter().map(|v| v.map(f64::to_bits)).collect()
            };
            assert_eq!(bits(a.column(indicator)), bits(b.column(indicator)));
        }
    }

    #[test]
    fn source_table_is_untouched() {
        let table = table_from_closes(&wavy(30));
        let before = table.clone();
        let enriched = compute_indicators(&table).unwrap();
        assert_eq!(table, before);
        assert_eq!(enriched.bars(), &before);
    }

    #[test]
    fn single_bar_degrades_gracefully() {
        let enriched = compute_indicators(&table_from_closes(&[42.0])).unwrap();
        let row = enriched.last_row().unwrap();
        assert_eq!(row.returns, None);
        assert_eq!(row.rsi_14, None);
        assert_eq!(row.volatility_20, None);
        assert_eq!(row.ema_20, Some(42.0));
        assert_eq!(row.macd, Some(0.0));
    }

    #[test]
    fn rising_closes_push_rsi_to_100() {
        let closes: Vec<f64> = (0..20).map(|i| 10.0 + 0.5 * i as f64).collect();
        let enriched = compute_indicators(&table_from_closes(&closes)).unwrap();
        let rsi = enriched.last_row().unwrap().rsi_14.unwrap();
        assert!(rsi > 99.9999 && rsi <= 100.0, "got {rsi}");
    }

    #[test]
    fn tail_pairs_bars_with_rows() {
        let enriched = compute_indicators(&table_from_closes(&wavy(30))).unwrap();
        let tail = enriched.tail(5);
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[4].indicators, enriched.last_row().unwrap());
        let json = serde_json::to_value(&tail[4]).unwrap();
        assert!(json.get("close").is_some());
        assert!(json.get("rsi_14").is_some());
    }
}
