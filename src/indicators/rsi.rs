// =============================================================================
// Relative Strength Index (RSI) — simple-average variant
// =============================================================================
//
// Step 1 — delta = close[i] - close[i-1]
// Step 2 — gain = max(delta, 0), loss = max(-delta, 0)
// Step 3 — avg_gain / avg_loss = rolling mean over `period` deltas, requiring a
//          full window (no Wilder smoothing)
// Step 4 — RS  = avg_gain / (avg_loss + 1e-9)
//          RSI = 100 - 100 / (1 + RS)
//
// The epsilon keeps RS finite when the window holds no losses; an all-gain
// window therefore reads just under 100 and a motionless window reads 0.
// =============================================================================

use super::series::{defined, diff, rolling_mean};

/// Added to the average loss before dividing.
pub const RSI_EPSILON: f64 = 1e-9;

/// Compute the RSI series aligned 1:1 with `closes`.
///
/// The first defined cell is at index `period` (one delta is lost to the
/// difference, `period` more fill the window). `period == 0` or a series with
/// fewer than two closes yields an all-undefined result.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; closes.len()];
    }

    let deltas = diff(&defined(closes));
    let gains: Vec<Option<f64>> = deltas.iter().map(|d| d.map(|v| v.max(0.0))).collect();
    let losses: Vec<Option<f64>> = deltas.iter().map(|d| d.map(|v| (-v).max(0.0))).collect();

    let avg_gain = rolling_mean(&gains, period, period);
    let avg_loss = rolling_mean(&losses, period, period);

    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) => rsi_from_averages(*g, *l),
            _ => None,
        })
        .collect()
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rs = avg_gain / (avg_loss + RSI_EPSILON);
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    if rsi.is_finite() {
        Some(rsi.clamp(0.0, 100.0))
    } else {
        None
    }
}
