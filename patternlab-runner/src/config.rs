//! Serializable evaluation configuration.
//!
//! Lives next to the engine sections in the same TOML document:
//!
//! ```toml
//! [matcher]
//! k = 5
//!
//! [evaluation]
//! folds = 5
//! min_confidence = 0.7
//! ```

use std::path::Path;

use patternlab_core::config::EngineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Engine(#[from] patternlab_core::ConfigError),

    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Cross-validation and sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Requested k-fold count when more than ten templates are eligible.
    pub folds: usize,
    /// Shuffle seed for k-fold splits.
    pub seed: u64,
    pub exclude_augmented: bool,
    pub min_confidence: f64,
    /// Thresholds tried by a sweep.
    pub thresholds: Vec<f64>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            seed: 42,
            exclude_augmented: true,
            min_confidence: 0.7,
            thresholds: vec![0.5, 0.6, 0.7, 0.8, 0.9],
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.folds < 2 {
            return Err(ConfigError::Invalid {
                field: "evaluation.folds",
                reason: format!("{} is below 2", self.folds),
            });
        }
        for &t in std::iter::once(&self.min_confidence).chain(&self.thresholds) {
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::Invalid {
                    field: "evaluation.thresholds",
                    reason: format!("{t} is outside [0, 1]"),
                });
            }
        }
        Ok(())
    }
}

/// Engine sections plus `[evaluation]`, parsed from one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

impl RunnerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.engine.validate()?;
        config.evaluation.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = EvaluationConfig::default();
        assert_eq!(c.folds, 5);
        assert_eq!(c.seed, 42);
        assert!(c.exclude_augmented);
        assert_eq!(c.thresholds, vec![0.5, 0.6, 0.7, 0.8, 0.9]);
    }

    #[test]
    fn parses_engine_and_evaluation_sections() {
        let config = RunnerConfig::from_toml_str(
            r#"
            [dtw]
            constraint = "none"

            [evaluation]
            folds = 3
            thresholds = [0.4, 0.8]
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.dtw.constraint, "none");
        assert_eq!(config.engine.matcher.k, 5);
        assert_eq!(config.evaluation.folds, 3);
        assert_eq!(config.evaluation.seed, 42);
        assert_eq!(config.evaluation.thresholds, vec![0.4, 0.8]);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(RunnerConfig::from_toml_str("").unwrap(), RunnerConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RunnerConfig::from_toml_str("[evaluation]\nfolds = 1\n").is_err());
        assert!(RunnerConfig::from_toml_str("[evaluation]\nthresholds = [1.5]\n").is_err());
        assert!(matches!(
            RunnerConfig::from_toml_str("[matcher]\nk = 0\n"),
            Err(ConfigError::Engine(_))
        ));
    }
}
