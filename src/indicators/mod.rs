// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator computations over close-price series.
// Every derived cell is `Option<f64>`: `None` marks the warm-up span (or an
// upstream gap), never a numeric zero.

pub mod engine;
pub mod macd;
pub mod rsi;
pub mod series;

pub use engine::{compute_indicators, EnrichedRow, EnrichedTable, Indicator, IndicatorRow};
