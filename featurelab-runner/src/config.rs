//! Serializable export configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration reproducing the legacy variable export.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use featurelab_core::catalog::{FeatureConfig, Tier};
use featurelab_core::stats::{HURST_MIN_WINDOW, MMI_MIN_WINDOW};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for an export run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// When a settled bar is handed to the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Offset of the exchange's local clock from the bar timestamps.
    pub utc_offset_hours: i32,
    /// Local hour at which records are emitted; every bar when unset.
    pub emit_hour: Option<u32>,
}

/// Complete configuration of one export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Instrument identifier, informational only.
    pub instrument: String,
    /// Nominal bar length, informational only. Recorded in the run id and
    /// logged; bar spacing is not checked against it because sessions and
    /// weekends leave gaps.
    pub bar_period_minutes: u32,
    pub session: SessionConfig,
    /// First date whose records are emitted (inclusive). Earlier bars still
    /// feed the indicators.
    pub start_date: Option<NaiveDate>,
    /// Last date processed (inclusive).
    pub end_date: Option<NaiveDate>,
    /// Override for the number of bars processed before the first record.
    pub warmup_bars: Option<usize>,
    pub output: PathBuf,
    /// Log and skip rows the sink fails to write instead of aborting.
    pub continue_on_sink_error: bool,
    pub features: FeatureConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instrument: "UNKNOWN".to_string(),
            bar_period_minutes: 1440,
            session: SessionConfig::default(),
            start_date: None,
            end_date: None,
            warmup_bars: None,
            output: PathBuf::from("variables.csv"),
            continue_on_sink_error: false,
            features: FeatureConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations whose windows cannot produce a defined value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.features;
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.bar_period_minutes == 0 {
            return invalid("bar_period_minutes must be at least 1".into());
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return invalid(format!("start_date {start} is after end_date {end}"));
            }
        }
        if let Some(hour) = self.session.emit_hour {
            if hour >= 24 {
                return invalid(format!("session.emit_hour {hour} is not an hour of the day"));
            }
        }
        if !(-23..=23).contains(&self.session.utc_offset_hours) {
            return invalid(format!(
                "session.utc_offset_hours {} is out of range",
                self.session.utc_offset_hours
            ));
        }
        if f.normalization_period < 2 {
            return invalid("features.normalization_period must be at least 2".into());
        }

        let periods = [
            ("volatility_period", f.volatility_period),
            ("baseline_period", f.baseline_period),
            ("trend_fast", f.trend_fast),
            ("trend_slow", f.trend_slow),
            ("variance_fast", f.variance_fast),
            ("variance_mid", f.variance_mid),
            ("atr_fast", f.atr_fast),
            ("atr_mid", f.atr_mid),
            ("band_fast", f.band_fast),
            ("extreme_period", f.extreme_period),
            ("target_atr_period", f.target_atr_period),
            ("smooth_period", f.smooth_period),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return invalid(format!("features.{name} must be at least 1"));
        }
        if let Some(p) = f.fast_periods.iter().find(|p| **p <= 2) {
            return invalid(format!("features.fast_periods entry {p} must exceed 2"));
        }
        if let Some(p) = f.cubic_periods.iter().find(|p| **p <= 3) {
            return invalid(format!("features.cubic_periods entry {p} must exceed 3"));
        }
        check_tiers("mmi_tiers", &f.mmi_tiers, MMI_MIN_WINDOW)?;
        check_tiers("hurst_tiers", &f.hurst_tiers, HURST_MIN_WINDOW)?;
        check_tiers("atr_tiers", &f.atr_tiers, 1)?;
        check_tiers("ranked_atr_tiers", &f.ranked_atr_tiers, 1)?;
        check_tiers("extended_mmi_tiers", &f.extended_mmi_tiers, MMI_MIN_WINDOW)?;
        check_tiers("extended_hurst_tiers", &f.extended_hurst_tiers, HURST_MIN_WINDOW)?;
        if !f.target_scale.is_finite() || f.target_scale == 0.0 {
            return invalid(format!(
                "features.target_scale {} must be finite and non-zero",
                f.target_scale
            ));
        }
        Ok(())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId, so exported files can
    /// be traced back to the settings that produced them.
    pub fn run_id(&self) -> Result<RunId, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        let hash = blake3::hash(json.as_bytes());
        Ok(hash.to_hex().to_string())
    }
}

fn check_tiers(name: &str, tiers: &[Tier], minimum: usize) -> Result<(), ConfigError> {
    if let Some(t) = tiers.iter().find(|t| t.period < minimum) {
        return Err(ConfigError::Invalid(format!(
            "features.{name} tier '{}' period {} is below the minimum {minimum}",
            t.label, t.period
        )));
    }
    if let Some(t) = tiers.iter().find(|t| t.label.is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "features.{name} has a tier with period {} and no label",
            t.period
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use featurelab_core::catalog::FeatureSchema;

    #[test]
    fn empty_file_is_the_legacy_export() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.features.normalization_period, 50);
        assert_eq!(config.output, PathBuf::from("variables.csv"));
    }

    #[test]
    fn parses_full_file() {
        let config = PipelineConfig::from_toml(
            r#"
            instrument = "EUR/USD"
            bar_period_minutes = 60
            start_date = "2009-01-01"
            end_date = "2019-12-31"
            output = "out/eurusd.csv"

            [session]
            utc_offset_hours = 1
            emit_hour = 9

            [features]
            schema = "extended"
            fast_periods = [4, 8]
            mmi_tiers = [{ label = "Fast", period = 100 }]
            "#,
        )
        .unwrap();
        assert_eq!(config.instrument, "EUR/USD");
        assert_eq!(config.session.emit_hour, Some(9));
        assert_eq!(config.features.schema, FeatureSchema::Extended);
        assert_eq!(config.features.fast_periods, vec![4, 8]);
        assert_eq!(config.features.mmi_tiers[0].period, 100);
        assert_eq!(config.features.baseline_period, 100);
    }

    #[test]
    fn rejects_reversed_dates() {
        let err = PipelineConfig::from_toml(
            "start_date = \"2020-01-02\"\nend_date = \"2020-01-01\"",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_short_hurst_tier() {
        let err = PipelineConfig::from_toml(
            "[features]\nhurst_tiers = [{ label = \"Tiny\", period = 10 }]",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Tiny"));
    }

    #[test]
    fn rejects_bad_emit_hour_and_periods() {
        assert!(PipelineConfig::from_toml("[session]\nemit_hour = 24").is_err());
        assert!(PipelineConfig::from_toml("[features]\nnormalization_period = 1").is_err());
        assert!(PipelineConfig::from_toml("[features]\ncubic_periods = [3]").is_err());
        assert!(PipelineConfig::from_toml("[features]\nfast_periods = [2, 5]").is_err());
        assert!(PipelineConfig::from_toml("[features]\natr_mid = 0").is_err());
        assert!(PipelineConfig::from_toml("[features]\nsmooth_period = 0").is_err());
        assert!(PipelineConfig::from_toml(
            "[features]\nextended_hurst_tiers = [{ label = \"Short\", period = 19 }]"
        )
        .is_err());
        assert!(PipelineConfig::from_toml(
            "[features]\nranked_atr_tiers = [{ label = \"Zero\", period = 0 }]"
        )
        .is_err());
    }

    #[test]
    fn rejects_unparseable_toml() {
        assert!(matches!(
            PipelineConfig::from_toml("instrument = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_run_id_deterministic() {
        let config = PipelineConfig::default();
        let id1 = config.run_id().unwrap();
        let id2 = config.run_id().unwrap();
        assert_eq!(id1, id2, "RunId should be deterministic");
        assert_eq!(id1.len(), 64);
    }

    #[test]
    fn test_run_id_changes_with_params() {
        let config1 = PipelineConfig::default();
        let mut config2 = config1.clone();
        config2.features.normalization_period = 30;
        assert_ne!(config1.run_id().unwrap(), config2.run_id().unwrap());
    }
}
