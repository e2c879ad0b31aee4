// =============================================================================
// Runtime Configuration — service defaults loaded from JSON
// =============================================================================
//
// Every tunable the service exposes lives here: the instrument and window a
// load falls back to, which backend answers by default, model names and the
// generation limits handed to the analysis clients.
//
// All fields carry `#[serde(default)]` so that an older or partial config
// file always loads.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::AnalysisSettings;
use crate::types::{Backend, Interval, Period};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_ticker() -> String {
    "RELIANCE.NS".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_output_tokens() -> u32 {
    800
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_question() -> String {
    "What is the overall trend and momentum for this instrument? \
     What are the key support and resistance zones, and what are the main \
     risks to watch out for?"
        .to_string()
}

fn default_bars_in_view() -> usize {
    50
}

fn default_indicator_rows_in_view() -> usize {
    20
}

// =============================================================================
// AppConfig
// =============================================================================

/// Service-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // --- Market data ---------------------------------------------------------

    /// Ticker used when a load request omits one.
    #[serde(default = "default_ticker")]
    pub default_ticker: String,

    #[serde(default)]
    pub default_period: Period,

    #[serde(default)]
    pub default_interval: Interval,

    // --- Analysis ------------------------------------------------------------

    /// Backend used when an analysis request omits one.
    #[serde(default)]
    pub default_backend: Backend,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Upper bound on generated tokens when the request does not set one.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout for every outbound HTTP call (market data and analysis).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Question asked when the caller leaves it blank.
    #[serde(default = "default_question")]
    pub default_question: String,

    // --- Views ---------------------------------------------------------------

    /// Most recent bars returned by the market endpoints.
    #[serde(default = "default_bars_in_view")]
    pub bars_in_view: usize,

    /// Most recent indicator rows returned by the market endpoints.
    #[serde(default = "default_indicator_rows_in_view")]
    pub indicator_rows_in_view: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_ticker: default_ticker(),
            default_period: Period::default(),
            default_interval: Interval::default(),
            default_backend: Backend::default(),
            openai_model: default_openai_model(),
            gemini_model: default_gemini_model(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            default_question: default_question(),
            bars_in_view: default_bars_in_view(),
            indicator_rows_in_view: default_indicator_rows_in_view(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing or unreadable file is an error; the caller decides whether
    /// to fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            ticker = %config.default_ticker,
            backend = %config.default_backend,
            "config loaded"
        );

        Ok(config)
    }

    /// Model and generation settings for the analysis clients.
    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            openai_model: self.openai_model.clone(),
            gemini_model: self.gemini_model.clone(),
            temperature: self.temperature,
            timeout_secs: self.request_timeout_secs,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.default_ticker, "RELIANCE.NS");
        assert_eq!(cfg.default_period, Period::SixMonths);
        assert_eq!(cfg.default_interval, Interval::OneDay);
        assert_eq!(cfg.default_backend, Backend::OpenAi);
        assert_eq!(cfg.max_output_tokens, 800);
        assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.bars_in_view, 50);
        assert_eq!(cfg.indicator_rows_in_view, 20);
        assert!(cfg.default_question.starts_with("What is the overall trend"));
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.openai_model, "gpt-4o-mini");
        assert_eq!(cfg.gemini_model, "gemini-2.5-flash");
        assert_eq!(cfg.request_timeout_secs, 30);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "default_ticker": "AAPL", "default_period": "1y", "default_backend": "gemini" }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.default_ticker, "AAPL");
        assert_eq!(cfg.default_period, Period::OneYear);
        assert_eq!(cfg.default_backend, Backend::Gemini);
        assert_eq!(cfg.default_interval, Interval::OneDay);
        assert_eq!(cfg.max_output_tokens, 800);
    }

    #[test]
    fn load_reads_file_and_reports_missing() {
        let path = std::env::temp_dir().join(format!("analyst_config_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "max_output_tokens": 256 }"#).unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.max_output_tokens, 256);
        std::fs::remove_file(&path).unwrap();

        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn analysis_settings_follow_config() {
        let cfg = AppConfig {
            openai_model: "gpt-4o".into(),
            request_timeout_secs: 10,
            ..AppConfig::default()
        };
        let settings = cfg.analysis_settings();
        assert_eq!(settings.openai_model, "gpt-4o");
        assert_eq!(settings.gemini_model, "gemini-2.5-flash");
        assert_eq!(settings.timeout_secs, 10);
    }
}
