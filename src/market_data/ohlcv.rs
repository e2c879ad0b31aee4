use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn is_valid(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}

// ---------------------------------------------------------------------------
// OhlcvTable
// ---------------------------------------------------------------------------

/// Bars for one instrument, strictly increasing by timestamp.
///
/// Timestamps are stored in UTC; `utc_offset_secs` is the exchange's offset
/// and decides which calendar date a bar belongs to.
///
/// The table itself may be empty; every consumer that needs a latest bar
/// rejects that state with [`DataError::EmptyTable`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OhlcvTable {
    bars: Vec<Bar>,
    utc_offset_secs: i32,
}

impl OhlcvTable {
    /// Build a table, checking ordering and per-bar validity.
    pub fn new(bars: Vec<Bar>) -> Result<Self, DataError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_valid() {
                return Err(DataError::InvalidBar { index });
            }
            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(DataError::OutOfOrder { index });
            }
        }
        Ok(Self {
            bars,
            utc_offset_secs: 0,
        })
    }

    /// Attach the exchange's offset from UTC.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset_secs = offset.local_minus_utc();
        self
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }

    /// Calendar date of `bar` at the exchange.
    pub fn local_date(&self, bar: &Bar) -> NaiveDate {
        bar.timestamp.with_timezone(&self.utc_offset()).date_naive()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar, if any.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close prices in bar order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// The most recent `count` bars (oldest-first order).
    pub fn tail(&self, count: usize) -> &[Bar] {
        let start = self.bars.len().saturating_sub(count);
        &self.bars[start..]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
