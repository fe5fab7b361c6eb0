//! The optimization record embedded in processed files.

use std::fmt;

use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};

/// `tEXt` keyword under which the record is stored.
pub const COMMENT_KEYWORD: &str = "LightFile";

/// Tool identifier written into the `by` field.
pub const TOOL_NAME: &str = "LightFile";

/// A quality score that may be positive infinity.
///
/// JSON has no infinity, so `+inf` is written as `null` and `null` reads back
/// as `+inf`. NaN and `-inf` are not representable and fail to serialize.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct MaybeInf(pub f64);

impl MaybeInf {
    pub const INFINITY: Self = Self(f64::INFINITY);

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_infinite(self) -> bool {
        self.0 == f64::INFINITY
    }
}

impl From<f64> for MaybeInf {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<MaybeInf> for f64 {
    fn from(value: MaybeInf) -> Self {
        value.0
    }
}

impl fmt::Display for MaybeInf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{:.2}", self.0)
        }
    }
}

impl Serialize for MaybeInf {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_infinite() {
            serializer.serialize_none()
        } else if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else {
            Err(S::Error::custom(format!("score {} has no JSON form", self.0)))
        }
    }
}

impl<'de> Deserialize<'de> for MaybeInf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(Self(value.unwrap_or(f64::INFINITY)))
    }
}

/// Record of one optimization run, stored as JSON in the output file.
///
/// Missing keys read back as zero values and unknown keys are ignored, so
/// records written by older or newer tools still parse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightFileComment {
    /// Optimization tool identifier
    pub by: String,
    /// Original file size in bytes
    pub before: i64,
    /// Size just before the comment was embedded
    pub after: i64,
    /// Whether the quantized image was kept
    pub pngquant: bool,
    /// PSNR between the original and the optimized pixels
    pub psnr: MaybeInf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn infinity_maps_to_null() {
        assert_eq!(serde_json::to_string(&MaybeInf::INFINITY).unwrap(), "null");
        let back: MaybeInf = serde_json::from_str("null").unwrap();
        assert!(back.is_infinite());
    }

    #[test]
    fn zero_and_integers_parse() {
        let zero: MaybeInf = serde_json::from_str("0").unwrap();
        assert_eq!(zero, MaybeInf(0.0));
        let whole: MaybeInf = serde_json::from_str("42").unwrap();
        assert_eq!(whole.value(), 42.0);
    }

    #[test]
    fn nan_and_negative_infinity_do_not_serialize() {
        assert!(serde_json::to_string(&MaybeInf(f64::NAN)).is_err());
        assert!(serde_json::to_string(&MaybeInf(f64::NEG_INFINITY)).is_err());
    }

    #[test]
    fn comment_field_order_and_names() {
        let comment = LightFileComment {
            by: "lightfile6-png".to_string(),
            before: 1000,
            after: 800,
            pngquant: true,
            psnr: MaybeInf::INFINITY,
        };
        assert_eq!(
            serde_json::to_string(&comment).unwrap(),
            r#"{"by":"lightfile6-png","before":1000,"after":800,"pngquant":true,"psnr":null}"#
        );
    }

    #[test]
    fn lenient_parsing() {
        let partial: LightFileComment = serde_json::from_str(r#"{"by":"x","extra":1}"#).unwrap();
        assert_eq!(partial.by, "x");
        assert_eq!(partial.before, 0);
        assert!(!partial.pngquant);
        assert_eq!(partial.psnr, MaybeInf(0.0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn finite_scores_round_trip(value in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            let json = serde_json::to_string(&MaybeInf(value)).unwrap();
            let back: MaybeInf = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back.value(), value);
        }
    }
}
