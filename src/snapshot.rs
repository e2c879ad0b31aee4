// =============================================================================
// Snapshot Summarizer — latest bar and latest indicators as prompt text
// =============================================================================
//
// Two renderers and one combiner. Missing indicators are omitted from the
// technical snapshot; the only failure is an empty price table.
// =============================================================================

use crate::error::DataError;
use crate::indicators::EnrichedTable;
use crate::market_data::OhlcvTable;

/// Trailer appended to every combined prompt.
pub const ANALYSIS_INSTRUCTIONS: &str = "Use this data to provide trading analysis, including trend, \
momentum, key levels, and risk factors.";

/// Render the most recent bar, dated at the exchange.
pub fn latest_raw_snapshot(table: &OhlcvTable) -> Result<String, DataError> {
    let last = table.last().ok_or(DataError::EmptyTable)?;
    Ok(format!(
        "Latest data for the instrument on {}: Open: {:.2}, High: {:.2}, Low: {:.2}, Close: {:.2}, Volume: {}",
        table.local_date(last),
        last.open,
        last.high,
        last.low,
        last.close,
        last.volume.trunc() as i64,
    ))
}

/// Render the indicators defined at the latest row, joined with `" | "`.
///
/// Returns an empty string when nothing is defined yet.
pub fn latest_technical_snapshot(enriched: &EnrichedTable) -> String {
    let Some(row) = enriched.last_row() else {
        return String::new();
    };

    let mut parts: Vec<String> = Vec::new();

    if let Some(v) = row.sma_20 {
        parts.push(format!("SMA20={v:.2}"));
    }
    if let Some(v) = row.sma_50 {
        parts.push(format!("SMA50={v:.2}"));
    }
    if let Some(v) = row.ema_20 {
        parts.push(format!("EMA20={v:.2}"));
    }
    if let Some(v) = row.rsi_14 {
        parts.push(format!("RSI14={v:.1}"));
    }
    // The signal and histogram exist wherever the MACD line does.
    if let (Some(m), Some(s), Some(h)) = (row.macd, row.macd_signal, row.macd_hist) {
        parts.push(format!("MACD={m:.4}, Signal={s:.4}, Hist={h:.4}"));
    }
    if let Some(v) = row.volatility_20 {
        parts.push(format!("20-day volatility={v:.4}"));
    }

    parts.join(" | ")
}

/// Compose the prompt document from both snapshots.
pub fn combine(raw_snapshot: &str, tech_snapshot: &str, instrument_label: &str) -> String {
    format!(
        "Instrument: {instrument_label}\n\n\
         Market snapshot:\n{raw_snapshot}\n\n\
         Technical indicators (latest):\n{tech_snapshot}\n\n\
         {ANALYSIS_INSTRUCTIONS}"
    )
}

/// Raw snapshot + technical snapshot + combine.
pub fn summarize(
    table: &OhlcvTable,
    enriched: &EnrichedTable,
    instrument_label: &str,
) -> Result<String, DataError> {
    let raw = latest_raw_snapshot(table)?;
    let tech = latest_technical_snapshot(enriched);
    Ok(combine(&raw, &tech, instrument_label))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute_indicators;
    use crate::market_data::ohlcv::tests::table_from_closes;
    use crate::market_data::Bar;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn single_bar_table() -> OhlcvTable {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        OhlcvTable::new(vec![Bar::new(ts, 100.0, 105.0, 99.0, 103.0, 1000.0)]).unwrap()
    }

    #[test]
    fn raw_snapshot_exact_format() {
        let text = latest_raw_snapshot(&single_bar_table()).unwrap();
        assert_eq!(
            text,
            "Latest data for the instrument on 2024-01-02: Open: 100.00, High: 105.00, \
             Low: 99.00, Close: 103.00, Volume: 1000"
        );
    }

    #[test]
    fn raw_snapshot_truncates_volume() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 15, 30, 0).unwrap();
        let table = OhlcvTable::new(vec![Bar::new(ts, 1.234, 1.5, 1.0, 1.255, 1234.9)]).unwrap();
        let text = latest_raw_snapshot(&table).unwrap();
        assert!(text.starts_with("Latest data for the instrument on 2024-03-05: Open: 1.23"));
        assert!(text.ends_with("Volume: 1234"));
    }

    #[test]
    fn raw_snapshot_uses_exchange_date() {
        // 2024-01-03 21:00 UTC is 2024-01-04 10:00 in Auckland.
        let ts = Utc.with_ymd_and_hms(2024, 1, 3, 21, 0, 0).unwrap();
        let table = OhlcvTable::new(vec![Bar::new(ts, 2.0, 2.0, 2.0, 2.0, 10.0)])
            .unwrap()
            .with_utc_offset(FixedOffset::east_opt(46_800).unwrap());
        let text = latest_raw_snapshot(&table).unwrap();
        assert!(text.starts_with("Latest data for the instrument on 2024-01-04:"), "{text}");
    }

    #[test]
    fn raw_snapshot_empty_table_fails() {
        assert_eq!(
            latest_raw_snapshot(&OhlcvTable::default()),
            Err(DataError::EmptyTable)
        );
    }

    #[test]
    fn technical_snapshot_three_bars_is_limited() {
        // EMA and MACD self-seed, so only windowed indicators are absent.
        let enriched = compute_indicators(&table_from_closes(&[10.0, 11.0, 12.0])).unwrap();
        let text = latest_technical_snapshot(&enriched);
        assert!(!text.contains("SMA20"));
        assert!(!text.contains("RSI14"));
        assert!(!text.contains("volatility"));
        assert!(text.starts_with("EMA20="));
    }

    #[test]
    fn technical_snapshot_all_undefined_is_empty() {
        let enriched = EnrichedTable::all_undefined(table_from_closes(&[10.0, 11.0, 12.0]));
        assert_eq!(latest_technical_snapshot(&enriched), "");
    }

    #[test]
    fn technical_snapshot_full_history_order() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).cos() * 3.0).collect();
        let enriched = compute_indicators(&table_from_closes(&closes)).unwrap();
        let text = latest_technical_snapshot(&enriched);
        let fragments: Vec<&str> = text.split(" | ").collect();
        assert_eq!(fragments.len(), 6);
        assert!(fragments[0].starts_with("SMA20="));
        assert!(fragments[1].starts_with("SMA50="));
        assert!(fragments[2].starts_with("EMA20="));
        assert!(fragments[3].starts_with("RSI14="));
        assert!(fragments[4].starts_with("MACD=") && fragments[4].contains(", Signal=") && fragments[4].contains(", Hist="));
        assert!(fragments[5].starts_with("20-day volatility="));
    }

    #[test]
    fn combine_embeds_both_snapshots() {
        let text = combine("RAW", "TECH", "AAPL");
        assert_eq!(
            text,
            "Instrument: AAPL\n\nMarket snapshot:\nRAW\n\nTechnical indicators (latest):\nTECH\n\n\
             Use this data to provide trading analysis, including trend, momentum, key levels, and risk factors."
        );
    }

    #[test]
    fn summarize_propagates_empty_table() {
        let enriched = compute_indicators(&table_from_closes(&[1.0])).unwrap();
        assert_eq!(
            summarize(&OhlcvTable::default(), &enriched, "X"),
            Err(DataError::EmptyTable)
        );
        let prompt = summarize(enriched.bars(), &enriched, "X").unwrap();
        assert!(prompt.starts_with("Instrument: X\n\nMarket snapshot:\nLatest data"));
    }
}
