// =============================================================================
// Series Utilities — rolling and exponential statistics
// =============================================================================
//
// Every function maps an ordered sequence of `Option<f64>` cells to a new
// sequence of the same length. `None` marks an undefined cell (warm-up or an
// upstream gap) and is never conflated with `0.0`.
//
//   rolling_mean  — mean of the defined values in the trailing window
//   rolling_std   — sample standard deviation (n - 1) of the same window
//   ewm_mean      — alpha = 2 / (span + 1), seeded with the first value
//   diff          — S[i] - S[i-1]
//   pct_change    — S[i] / S[i-1] - 1
// =============================================================================

/// Lift a dense series into optional cells.
pub fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|&v| Some(v)).collect()
}

/// Defined values of the window ending at `i` (clipped to available history).
fn window_values(series: &[Option<f64>], i: usize, window: usize) -> impl Iterator<Item = f64> + '_ {
    let start = (i + 1).saturating_sub(window);
    series[start..=i].iter().filter_map(|v| *v).filter(|v| v.is_finite())
}

/// Rolling arithmetic mean.
///
/// Cell `i` is defined when the trailing `window` holds at least
/// `min_periods` defined values. `window == 0` yields an all-undefined series.
pub fn rolling_mean(series: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; series.len()];
    }
    let min_periods = min_periods.max(1);

    (0..series.len())
        .map(|i| {
            let (sum, count) = window_values(series, i, window)
                .fold((0.0_f64, 0_usize), |(s, c), v| (s + v, c + 1));
            if count >= min_periods {
                Some(sum / count as f64)
            } else {
                None
            }
        })
        .collect()
}

/// Rolling sample standard deviation.
///
/// Same `min_periods` rule as [`rolling_mean`]; a window with fewer than two
/// defined values is always undefined.
pub fn rolling_std(series: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; series.len()];
    }
    let min_periods = min_periods.max(2);

    (0..series.len())
        .map(|i| {
            let values: Vec<f64> = window_values(series, i, window).collect();
            if values.len() < min_periods {
                return None;
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            Some(variance.sqrt())
        })
        .collect()
}

/// Exponentially weighted mean, non-adjusted form.
///
/// Seeded with the first defined value; no warm-up gap after that. An
/// undefined input after the seed produces an undefined output and leaves the
/// running average untouched.
pub fn ewm_mean(series: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev: Option<f64> = None;

    series
        .iter()
        .map(|cell| {
            let value = (*cell)?;
            let next = match prev {
                None => value,
                Some(p) => alpha * value + (1.0 - alpha) * p,
            };
            prev = Some(next);
            Some(next)
        })
        .collect()
}

/// First difference.
pub fn diff(series: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(series.len());
    if series.is_empty() {
        return out;
    }
    out.push(None);
    for w in series.windows(2) {
        out.push(match (w[0], w[1]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        });
    }
    out
}

/// Fractional change from the previous cell; undefined after a zero.
pub fn pct_change(series: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(series.len());
    if series.is_empty() {
        return out;
    }
    out.push(None);
    for w in series.windows(2) {
        out.push(match (w[0], w[1]) {
            (Some(prev), Some(curr)) if prev != 0.0 => Some(curr / prev - 1.0),
            _ => None,
        });
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        matches!(a, Some(v) if (v - b).abs() < 1e-12)
    }

    // ---- rolling_mean -----------------------------------------------------

    #[test]
    fn rolling_mean_respects_min_periods() {
        let s = defined(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let m = rolling_mean(&s, 4, 3);
        assert_eq!(m[0], None);
        assert_eq!(m[1], None);
        assert!(approx(m[2], 2.0)); // clipped window [1,2,3]
        assert!(approx(m[3], 2.5));
        assert!(approx(m[5], 4.5)); // [3,4,5,6]
    }

    #[test]
    fn rolling_mean_skips_undefined_cells() {
        let s = vec![None, Some(2.0), Some(4.0), None, Some(6.0)];
        let m = rolling_mean(&s, 3, 2);
        assert_eq!(m[0], None);
        assert_eq!(m[1], None);
        assert!(approx(m[2], 3.0));
        assert!(approx(m[3], 3.0)); // [2, 4, None]
        assert_eq!(m[4], Some(5.0)); // [4, None, 6]
    }

    #[test]
    fn rolling_mean_zero_window_is_undefined() {
        let m = rolling_mean(&defined(&[1.0, 2.0]), 0, 0);
        assert_eq!(m, vec![None, None]);
    }

    // ---- rolling_std ------------------------------------------------------

    #[test]
    fn rolling_std_is_sample_deviation() {
        let s = defined(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let sd = rolling_std(&s, 8, 8);
        // Sample variance of the classic population-sd-2 set is 32/7.
        assert!(approx(sd[7], (32.0_f64 / 7.0).sqrt()));
        assert!(sd[..7].iter().all(Option::is_none));
    }

    #[test]
    fn rolling_std_needs_two_values() {
        let sd = rolling_std(&defined(&[1.0, 2.0]), 5, 1);
        assert_eq!(sd[0], None);
        assert!(approx(sd[1], 0.5_f64.sqrt()));
    }

    // ---- ewm_mean ---------------------------------------------------------

    #[test]
    fn ewm_seeds_with_first_value() {
        let s = defined(&[10.0, 20.0, 30.0]);
        let e = ewm_mean(&s, 3); // alpha = 0.5
        assert_eq!(e[0], Some(10.0));
        assert!(approx(e[1], 15.0));
        assert!(approx(e[2], 22.5));
    }

    #[test]
    fn ewm_waits_for_first_defined_value() {
        let s = vec![None, Some(4.0), None, Some(8.0)];
        let e = ewm_mean(&s, 3);
        assert_eq!(e[0], None);
        assert_eq!(e[1], Some(4.0));
        assert_eq!(e[2], None);
        assert!(approx(e[3], 6.0));
    }

    // ---- diff / pct_change ------------------------------------------------

    #[test]
    fn diff_leading_cell_undefined() {
        let d = diff(&defined(&[1.0, 4.0, 2.0]));
        assert_eq!(d, vec![None, Some(3.0), Some(-2.0)]);
        assert!(diff(&[]).is_empty());
    }

    #[test]
    fn pct_change_undefined_after_zero() {
        let r = pct_change(&defined(&[0.0, 5.0, 10.0]));
        assert_eq!(r[0], None);
        assert_eq!(r[1], None);
        assert!(approx(r[2], 1.0));
    }
}
