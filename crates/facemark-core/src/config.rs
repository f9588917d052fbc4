//! Matching policy configuration.
//!
//! Thresholds and metric weights are empirical constants, not validated
//! biometric parameters. They are exposed here so deployments can tune
//! them, either from a TOML document or programmatically.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DUPLICATE_THRESHOLD: f32 = 90.0;
pub const MATCH_THRESHOLD: f32 = 90.0;
pub const LOW_CONFIDENCE_NOTICE: f32 = 50.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{name} must be within [0, 100], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f32 },
    #[error("metric weights must be finite, non-negative and not all zero")]
    InvalidWeights,
}

/// Relative weights of the four similarity metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub euclidean: f32,
    pub correlation: f32,
    pub cosine: f32,
    pub manhattan: f32,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            euclidean: 0.25,
            correlation: 0.35,
            cosine: 0.25,
            manhattan: 0.15,
        }
    }
}

impl MetricWeights {
    fn is_valid(&self) -> bool {
        let all = [self.euclidean, self.correlation, self.cosine, self.manhattan];
        all.iter().all(|w| w.is_finite() && *w >= 0.0) && all.iter().any(|w| *w > 0.0)
    }
}

/// Enrollment and login policy values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Minimum similarity at which a new enrollment is rejected.
    pub duplicate_threshold: f32,
    /// Minimum similarity at which a login is accepted.
    pub match_threshold: f32,
    /// Below-threshold scores at or above this are reported as near misses.
    pub low_confidence_notice: f32,
    pub weights: MetricWeights,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: DUPLICATE_THRESHOLD,
            match_threshold: MATCH_THRESHOLD,
            low_confidence_notice: LOW_CONFIDENCE_NOTICE,
            weights: MetricWeights::default(),
        }
    }
}

impl MatchConfig {
    /// Parse a TOML document; missing fields keep their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("duplicate_threshold", self.duplicate_threshold),
            ("match_threshold", self.match_threshold),
            ("low_confidence_notice", self.low_confidence_notice),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if !self.weights.is_valid() {
            return Err(ConfigError::InvalidWeights);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = MatchConfig::default();
        assert_eq!(c.duplicate_threshold, 90.0);
        assert_eq!(c.match_threshold, 90.0);
        assert_eq!(c.low_confidence_notice, 50.0);
        assert_eq!(c.weights.correlation, 0.35);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let c = MatchConfig::from_toml_str(
            r#"
            match_threshold = 85.0

            [weights]
            correlation = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(c.match_threshold, 85.0);
        assert_eq!(c.duplicate_threshold, 90.0);
        assert_eq!(c.weights.correlation, 0.5);
        assert_eq!(c.weights.euclidean, 0.25);
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = MatchConfig::from_toml_str("duplicate_threshold = 120.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ThresholdOutOfRange { name: "duplicate_threshold", .. }
        ));
    }

    #[test]
    fn test_zero_weights_rejected() {
        let err = MatchConfig::from_toml_str(
            "[weights]\neuclidean = 0.0\ncorrelation = 0.0\ncosine = 0.0\nmanhattan = 0.0",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWeights));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "low_confidence_notice = 40.0").unwrap();
        let c = MatchConfig::load(file.path()).unwrap();
        assert_eq!(c.low_confidence_notice, 40.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MatchConfig::load(Path::new("/nonexistent/facemark.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
