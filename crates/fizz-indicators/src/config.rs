//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use fizz_core::{FizzError, Result};
use serde::{Deserialize, Serialize};

use crate::line_items::{LineItemRule, LineItemTable};

/// Longest accepted earnings lookback, ten years.
pub const MAX_EARNINGS_LOOKBACK_DAYS: u32 = 3_660;

/// How net cash flow treats a cash flow statement that lacks some components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowPolicy {
    /// Missing components count as zero and the result is flagged partial.
    #[default]
    ZeroFill,
    /// Any missing component fails with missing data.
    Strict,
}

/// Tunables of the [`IndicatorEngine`](crate::IndicatorEngine).
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes:
///
/// ```json
/// { "earnings_lookback_days": 400, "cash_flow_policy": "strict" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How far back from the cutoff a net income figure still counts as trailing earnings.
    pub earnings_lookback_days: u32,
    /// Time-to-live for cached indicators.
    pub cache_ttl_secs: u64,
    /// Treatment of partial cash flow statements.
    pub cash_flow_policy: CashFlowPolicy,
    /// Currency units per stored amount; CVM datasets are filed in thousands.
    pub amount_scale: f64,
    /// Replaces the built-in line item table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItemRule>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            earnings_lookback_days: 540,
            cache_ttl_secs: 86_400,
            cash_flow_policy: CashFlowPolicy::ZeroFill,
            amount_scale: 1_000.0,
            line_items: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    /// Returns [`FizzError::Parse`] on malformed JSON and [`FizzError::Config`]
    /// if a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| FizzError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration from a file.
    ///
    /// # Errors
    /// Returns [`FizzError::Config`] if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| FizzError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges and the inline line item table.
    ///
    /// # Errors
    /// Returns [`FizzError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_EARNINGS_LOOKBACK_DAYS).contains(&self.earnings_lookback_days) {
            return Err(FizzError::Config(format!(
                "earnings_lookback_days must be between 1 and {}, got {}",
                MAX_EARNINGS_LOOKBACK_DAYS, self.earnings_lookback_days
            )));
        }
        if !(self.amount_scale.is_finite() && self.amount_scale > 0.0) {
            return Err(FizzError::Config(format!(
                "amount_scale must be a positive number, got {}",
                self.amount_scale
            )));
        }
        self.line_item_table().map(|_| ())
    }

    /// Earnings lookback window.
    #[must_use]
    pub fn earnings_lookback(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.earnings_lookback_days))
    }

    /// Cache time-to-live.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Builds the line item table this configuration selects.
    ///
    /// # Errors
    /// Returns [`FizzError::Config`] if the inline rules conflict.
    pub fn line_item_table(&self) -> Result<LineItemTable> {
        match &self.line_items {
            Some(rules) => LineItemTable::from_rules(rules.clone()),
            None => Ok(LineItemTable::default()),
        }
    }
}
