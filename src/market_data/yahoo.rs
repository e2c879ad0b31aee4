// =============================================================================
// Yahoo Finance chart client — raw OHLCV history
// =============================================================================
//
// GET /v8/finance/chart/{ticker}?range={period}&interval={interval}
//
// The response is column-oriented:
//   chart.result[0].timestamp                  — unix seconds
//   chart.result[0].indicators.quote[0].open   — (and high/low/close/volume)
//   chart.result[0].indicators.adjclose[0].adjclose
//   chart.result[0].meta.gmtoffset             — exchange offset, seconds
// Gaps arrive as JSON nulls and are left for the normalizer to drop.
// =============================================================================

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::normalizer::RawFrame;
use super::MarketDataSource;
use crate::error::FetchError;
use crate::types::{Interval, Period};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo Finance chart API client.
#[derive(Debug, Clone)]
pub struct YahooClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout_secs)
    }

    /// Create a client against a different host (mirrors, proxies).
    pub fn with_base_url(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) market-analyst/1.0")
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    #[instrument(skip(self), name = "yahoo::fetch_raw")]
    async fn fetch_raw(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<RawFrame, FetchError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("range", period.as_str()),
                ("interval", interval.as_str()),
                ("includePrePost", "false"),
            ])
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = interpret_response(status, &text)?;

        let frame = parse_chart(&body)?;
        debug!(ticker, rows = frame.row_count(), "chart fetched");
        Ok(frame)
    }
}

/// Longest error body carried into [`FetchError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Decode a chart response body, surfacing provider and HTTP failures.
///
/// Error statuses may carry plain text (e.g. `429 Too Many Requests`), so the
/// body is only required to be JSON on success.
fn interpret_response(status: u16, text: &str) -> Result<Value, FetchError> {
    let success = (200..300).contains(&status);
    let parsed = serde_json::from_str::<Value>(text);

    // Yahoo reports unknown symbols as 404 with a chart.error body.
    if let Some(description) = parsed.as_ref().ok().and_then(chart_error) {
        return Err(FetchError::Provider(description));
    }
    if !success {
        return Err(FetchError::Status {
            status,
            body: text.chars().take(MAX_ERROR_BODY).collect(),
        });
    }
    parsed.map_err(|e| FetchError::Malformed(e.to_string()))
}

/// Extract `chart.error.description` when the provider reports one.
fn chart_error(body: &Value) -> Option<String> {
    let err = body.get("chart")?.get("error")?;
    if err.is_null() {
        return None;
    }
    let description = err
        .get("description")
        .and_then(Value::as_str)
        .or_else(|| err.get("code").and_then(Value::as_str))
        .unwrap_or("unknown error");
    Some(description.to_string())
}

/// Turn a chart response into a vendor-named [`RawFrame`].
///
/// A result without a `timestamp` array is a valid empty history.
pub fn parse_chart(body: &Value) -> Result<RawFrame, FetchError> {
    let result = body
        .pointer("/chart/result/0")
        .ok_or_else(|| FetchError::Malformed("missing chart.result[0]".into()))?;

    let timestamps = array_at(result, "/timestamp");
    let quote = result.pointer("/indicators/quote/0");
    let series = |field: &str| -> Vec<Value> {
        quote
            .map(|q| array_at(q, &format!("/{field}")))
            .unwrap_or_default()
    };

    let gmtoffset = result
        .pointer("/meta/gmtoffset")
        .and_then(Value::as_i64)
        .and_then(|secs| i32::try_from(secs).ok())
        .unwrap_or(0);

    let mut frame = RawFrame::new()
        .with_utc_offset(gmtoffset)
        .with_column("Date", timestamps)
        .with_column("Open", series("open"))
        .with_column("High", series("high"))
        .with_column("Low", series("low"))
        .with_column("Close", series("close"))
        .with_column("Volume", series("volume"));

    let adj = array_at(result, "/indicators/adjclose/0/adjclose");
    if !adj.is_empty() {
        frame = frame.with_column("Adj Close", adj);
    }

    Ok(frame)
}

fn array_at(value: &Value, pointer: &str) -> Vec<Value> {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::normalizer::normalize;
    use serde_json::json;

    fn sample_chart() -> Value {
        json!({
            "chart": {
                "result": [{
                    "meta": { "symbol": "AAPL", "currency": "USD" },
                    "timestamp": [1704153600, 1704240000, 1704326400],
                    "indicators": {
                        "quote": [{
                            "open":   [187.15, 184.22, null],
                            "high":   [188.44, 185.88, null],
                            "low":    [183.89, 183.43, null],
                            "close":  [185.64, 184.25, null],
                            "volume": [82488700, 58414500, null]
                        }],
                        "adjclose": [{ "adjclose": [184.73, 183.35, null] }]
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn parse_chart_maps_vendor_columns() {
        let frame = parse_chart(&sample_chart()).unwrap();
        assert_eq!(
            frame.column_names(),
            vec!["Date", "Open", "High", "Low", "Close", "Volume", "Adj Close"]
        );
        assert_eq!(frame.row_count(), 3);
    }

    #[test]
    fn parsed_chart_normalizes_and_drops_gaps() {
        let table = normalize(&parse_chart(&sample_chart()).unwrap()).unwrap();
        assert_eq!(table.len(), 2);
        let last = table.last().unwrap();
        assert!((last.close - 184.25).abs() < 1e-9);
        assert_eq!(last.timestamp.date_naive().to_string(), "2024-01-03");
    }

    #[test]
    fn chart_without_timestamps_is_empty() {
        let body = json!({ "chart": { "result": [{ "indicators": { "quote": [{}] } }], "error": null } });
        let frame = parse_chart(&body).unwrap();
        assert_eq!(frame.row_count(), 0);
    }

    #[test]
    fn provider_error_is_surfaced() {
        let body = json!({
            "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } }
        });
        assert_eq!(
            chart_error(&body).as_deref(),
            Some("No data found, symbol may be delisted")
        );
        assert!(chart_error(&sample_chart()).is_none());
    }

    #[test]
    fn exchange_offset_sets_local_date() {
        // 2024-01-04 10:00 NZDT, one bar.
        let body = json!({
            "chart": {
                "result": [{
                    "meta": { "symbol": "AIR.NZ", "gmtoffset": 46800, "exchangeTimezoneName": "Pacific/Auckland" },
                    "timestamp": [1704315600],
                    "indicators": { "quote": [{
                        "open": [0.61], "high": [0.62], "low": [0.6], "close": [0.615], "volume": [120000]
                    }] }
                }],
                "error": null
            }
        });
        let frame = parse_chart(&body).unwrap();
        assert_eq!(frame.utc_offset_secs, 46_800);
        let table = normalize(&frame).unwrap();
        let text = crate::snapshot::latest_raw_snapshot(&table).unwrap();
        assert!(text.starts_with("Latest data for the instrument on 2024-01-04:"), "{text}");
    }

    #[test]
    fn plain_text_error_keeps_status() {
        match interpret_response(429, "Too Many Requests") {
            Err(FetchError::Status { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "Too Many Requests");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn not_found_with_chart_error_is_provider_error() {
        let text = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        assert!(matches!(interpret_response(404, text), Err(FetchError::Provider(d)) if d == "No data found"));
    }

    #[test]
    fn success_with_bad_json_is_malformed() {
        assert!(matches!(interpret_response(200, "<html>"), Err(FetchError::Malformed(_))));
        assert!(interpret_response(200, &sample_chart().to_string()).is_ok());
    }

    #[test]
    fn missing_result_is_malformed() {
        let body = json!({ "chart": { "result": [], "error": null } });
        assert!(matches!(parse_chart(&body), Err(FetchError::Malformed(_))));
    }
}
