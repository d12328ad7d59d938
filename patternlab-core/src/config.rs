//! Engine configuration — TOML-backed, one section per component.
//!
//! ```toml
//! [preprocessing]
//! normalization = "zscore"
//! use_derivative = true
//!
//! [dtw]
//! variant = "derivative"
//! constraint = "sakoe_chiba"
//! sakoe_chiba_window = 0.15
//!
//! [matcher]
//! k = 5
//! ```
//!
//! Every field has a default, so an empty document is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::preprocess::{Normalization, Preprocessor};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level engine configuration passed to every component constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub preprocessing: PreprocessingConfig,
    pub dtw: DtwConfig,
    pub matcher: MatcherConfig,
    pub confidence: ConfidenceConfig,
    pub augmentation: AugmentationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub normalization: Normalization,
    pub use_derivative: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            normalization: Normalization::Zscore,
            use_derivative: true,
        }
    }
}

impl PreprocessingConfig {
    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.normalization).with_derivative(self.use_derivative)
    }
}

/// DTW variant and constraint. Strings are resolved by
/// [`DtwAlgorithm::resolve`](crate::distance::DtwAlgorithm::resolve).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtwConfig {
    /// `"derivative"` or `"standard"`.
    pub variant: String,
    /// `"sakoe_chiba"`, `"adtw"` or `"none"`.
    pub constraint: String,
    /// Sakoe–Chiba half-width as a fraction of sequence length.
    pub sakoe_chiba_window: f64,
    /// ADTW band half-width as a fraction of sequence length.
    pub amercing_penalty: f64,
    /// ADTW cost per non-diagonal step.
    pub warp_penalty: f64,
    pub use_early_abandon: bool,
}

impl Default for DtwConfig {
    fn default() -> Self {
        Self {
            variant: "derivative".into(),
            constraint: "sakoe_chiba".into(),
            sakoe_chiba_window: 0.15,
            amercing_penalty: 0.5,
            warp_penalty: 1.0,
            use_early_abandon: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Neighbors kept after exact ranking.
    pub k: usize,
    pub use_lb_keogh: bool,
    /// Fraction of templates kept by LB_Keogh pruning, in (0, 1].
    pub prune_fraction: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            k: 5,
            use_lb_keogh: true,
            prune_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub closeness: f64,
    pub consensus: f64,
    pub separation: f64,
    pub quality: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            closeness: 0.35,
            consensus: 0.30,
            separation: 0.20,
            quality: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    pub mirror: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self { mirror: true }
    }
}

impl EngineConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matcher.k == 0 {
            return Err(invalid("matcher.k", "must be at least 1"));
        }
        let fraction = self.matcher.prune_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(invalid(
                "matcher.prune_fraction",
                format!("{fraction} is outside (0, 1]"),
            ));
        }
        for (field, value) in [
            ("dtw.sakoe_chiba_window", self.dtw.sakoe_chiba_window),
            ("dtw.amercing_penalty", self.dtw.amercing_penalty),
            ("dtw.warp_penalty", self.dtw.warp_penalty),
            ("confidence.closeness", self.confidence.closeness),
            ("confidence.consensus", self.confidence.consensus),
            ("confidence.separation", self.confidence.separation),
            ("confidence.quality", self.confidence.quality),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, format!("{value} must be finite and non-negative")));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
