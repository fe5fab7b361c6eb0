//! Quality levels and optimizer configuration.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Global PSNR floor checked before anything is written.
pub const INSPECTION_FLOOR_DB: f64 = 35.0;

/// How much quality loss quantization may introduce.
///
/// Parsed from free-form strings: `"high"`, `"low"` and `"force"` are
/// recognised, anything else (including `""`) is the default level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QualityLevel {
    High,
    #[default]
    Default,
    Low,
    /// Accept the quantized image whatever its score
    Force,
}

impl QualityLevel {
    /// Minimum PSNR a quantized image needs at this level. `None` means no minimum.
    pub fn min_psnr(&self) -> Option<f64> {
        match self {
            Self::High => Some(45.0),
            Self::Default => Some(42.0),
            Self::Low => Some(39.0),
            Self::Force => None,
        }
    }

    /// Whether a quantized image scoring `psnr` is kept. Infinity always is.
    pub fn accepts(&self, psnr: f64) -> bool {
        if psnr == f64::INFINITY {
            return true;
        }
        match self.min_psnr() {
            Some(min) => psnr >= min,
            None => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Default => "",
            Self::Low => "low",
            Self::Force => "force",
        }
    }
}

impl From<&str> for QualityLevel {
    fn from(value: &str) -> Self {
        match value {
            "high" => Self::High,
            "low" => Self::Low,
            "force" => Self::Force,
            _ => Self::Default,
        }
    }
}

impl From<String> for QualityLevel {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<QualityLevel> for String {
    fn from(value: QualityLevel) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for QualityLevel {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Settings used to build an [`Optimizer`](crate::processing::Optimizer).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizerConfig {
    /// Threshold table row used to gate quantization
    pub quality: QualityLevel,
    /// Final PSNR floor in dB
    pub inspection_floor: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            quality: QualityLevel::Default,
            inspection_floor: INSPECTION_FLOOR_DB,
        }
    }
}
