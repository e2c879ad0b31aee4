// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   ema_fast  = EMA(close, fast)
//   ema_slow  = EMA(close, slow)
//   macd      = ema_fast - ema_slow
//   signal    = EMA(macd, signal)
//   histogram = macd - signal
//
// All EMAs are self-seeding, so every line is defined from the first bar.

use super::series::{defined, ewm_mean};

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// The three MACD lines, each aligned 1:1 with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Compute MACD with explicit spans.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let series = defined(closes);
    let ema_fast = ewm_mean(&series, fast);
    let ema_slow = ewm_mean(&series, slow);

    let macd: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let signal_line = ewm_mean(&macd, signal);

    let histogram = macd
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();

    MacdSeries {
        macd,
        signal: signal_line,
        histogram,
    }
}

/// MACD(12, 26, 9).
pub fn standard_macd(closes: &[f64]) -> MacdSeries {
    calculate_macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)
}
