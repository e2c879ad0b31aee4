// =============================================================================
// Data Normalizer — raw provider frame -> canonical OHLCV table
// =============================================================================
//
// Column names are resolved through a fixed alias set per canonical field,
// ignoring case and whitespace. Rows without a usable timestamp or close are
// dropped (never coerced to zero); rows whose other fields are not finite
// numbers are dropped as well so every surviving bar is fully valid. The
// survivors are sorted by timestamp and de-duplicated (last row wins).
//
// Only the six resolved columns bound the row count; extra vendor columns
// (Adj Close, Dividends, ...) never truncate the table. Naive date strings are
// read in the frame's exchange offset.
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ohlcv::{Bar, OhlcvTable};
use crate::error::DataError;

/// Unix timestamps above this are read as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Canonical field name and the aliases accepted for it (already folded).
const FIELD_ALIASES: [(&str, &[&str]); 6] = [
    ("date", &["date", "datetime", "timestamp", "time"]),
    ("open", &["open"]),
    ("high", &["high"]),
    ("low", &["low"]),
    ("close", &["close"]),
    ("volume", &["volume", "vol"]),
];

// ---------------------------------------------------------------------------
// RawFrame
// ---------------------------------------------------------------------------

/// A named column of untyped cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<serde_json::Value>,
}

/// Column-oriented time series as returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    pub columns: Vec<RawColumn>,
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    pub utc_offset_secs: i32,
}

impl RawFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.columns.push(RawColumn {
            name: name.into(),
            values,
        });
        self
    }

    pub fn with_utc_offset(mut self, secs: i32) -> Self {
        self.utc_offset_secs = secs;
        self
    }

    /// Length of the longest column.
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Lower-case and strip all whitespace.
fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Index of the first column whose folded name is one of `aliases`.
fn resolve(frame: &RawFrame, aliases: &[&str]) -> Option<usize> {
    frame
        .columns
        .iter()
        .position(|c| aliases.contains(&fold_name(&c.name).as_str()))
}

/// Parse a cell holding a number or a numeric string.
pub fn parse_number(val: &serde_json::Value) -> Option<f64> {
    let n = match val {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Parse a cell holding a unix time or a date/datetime string.
///
/// Strings without an explicit offset are exchange-local times.
pub fn parse_timestamp(val: &serde_json::Value, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let local = |ndt: NaiveDateTime| {
        offset
            .from_local_datetime(&ndt)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    };

    match val {
        serde_json::Value::Number(n) => {
            let raw = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if raw.abs() > MILLIS_THRESHOLD {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return local(ndt);
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .and_then(local)
        }
        _ => None,
    }
}

/// Reshape `frame` into a validated [`OhlcvTable`].
pub fn normalize(frame: &RawFrame) -> Result<OhlcvTable, DataError> {
    if frame.row_count() == 0 {
        return Err(DataError::EmptyTable);
    }

    let mut indices = [0usize; 6];
    let mut missing = Vec::new();
    for (slot, (field, aliases)) in FIELD_ALIASES.iter().enumerate() {
        match resolve(frame, aliases) {
            Some(idx) => indices[slot] = idx,
            None => missing.push((*field).to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(DataError::Schema {
            missing,
            available: frame.column_names(),
        });
    }

    let lengths = indices.map(|idx| frame.columns[idx].values.len());
    let rows = lengths.iter().copied().min().unwrap_or(0);
    let longest = lengths.iter().copied().max().unwrap_or(0);
    if longest == 0 {
        return Err(DataError::EmptyTable);
    }
    // Rows past the shortest required column are incomplete.
    let truncated = longest - rows;
    if truncated > 0 {
        let shortest = FIELD_ALIASES
            .iter()
            .zip(lengths)
            .filter(|(_, len)| *len == rows)
            .map(|((field, _), _)| *field)
            .collect::<Vec<_>>();
        warn!(rows, longest, ?shortest, "required columns differ in length; dropping incomplete rows");
    }

    let offset = utc_offset(frame.utc_offset_secs);
    let cell = |slot: usize, row: usize| &frame.columns[indices[slot]].values[row];

    // Keyed by timestamp: sorts and lets a later duplicate replace an earlier one.
    let mut by_time: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    let mut dropped = truncated;

    for row in 0..rows {
        let timestamp = parse_timestamp(cell(0, row), &offset);
        let close = parse_number(cell(4, row));
        let open = parse_number(cell(1, row));
        let high = parse_number(cell(2, row));
        let low = parse_number(cell(3, row));
        let volume = parse_number(cell(5, row)).filter(|v| *v >= 0.0);

        match (timestamp, open, high, low, close, volume) {
            (Some(ts), Some(o), Some(h), Some(l), Some(c), Some(v)) => {
                by_time.insert(ts, Bar::new(ts, o, h, l, c, v));
            }
            _ => dropped += 1,
        }
    }

    if by_time.is_empty() {
        return Err(DataError::NoUsableRows { dropped });
    }

    let duplicates = longest - dropped - by_time.len();
    debug!(rows = longest, dropped, duplicates, kept = by_time.len(), "raw frame normalized");

    Ok(OhlcvTable::new(by_time.into_values().collect())?.with_utc_offset(offset))
}

/// Out-of-range offsets fall back to UTC.
fn utc_offset(secs: i32) -> FixedOffset {
    FixedOffset::east_opt(secs).unwrap_or_else(|| {
        warn!(secs, "invalid exchange UTC offset; using UTC");
        Utc.fix()
    })
}
