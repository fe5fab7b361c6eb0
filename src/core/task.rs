//! Batch task definition.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::QualityLevel;

/// Represents a single image optimization task.
///
/// Batch files are JSON arrays of these:
/// `[{"inputPath": "a.png", "outputPath": "out/a.png", "quality": "high"}]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTask {
    /// Path to the source PNG
    pub input_path: PathBuf,
    /// Path where the optimized PNG will be written
    pub output_path: PathBuf,
    /// Overrides the batch-wide quality level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityLevel>,
}

impl ImageTask {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: QualityLevel) -> Self {
        self.quality = Some(quality);
        self
    }
}
