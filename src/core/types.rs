//! Result types produced by one optimization run.

use serde::Serialize;

use crate::core::comment::MaybeInf;
use crate::utils::{DataError, reduction_percent};

/// What the metadata stripper removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripSummary {
    /// tEXt, zTXt and iTXt chunks
    pub text_chunks: usize,
    /// tIME chunks
    pub time_chunks: usize,
    /// eXIf chunks
    pub exif_chunks: usize,
    /// Any other ancillary chunk not needed for display
    pub other_chunks: usize,
    /// Serialized bytes removed, chunk framing included
    pub bytes_removed: usize,
}

impl StripSummary {
    /// Number of chunks removed across all categories.
    pub fn total(&self) -> usize {
        self.text_chunks + self.time_chunks + self.exif_chunks + self.other_chunks
    }
}

/// Outcome of the metadata strip step. Failure does not abort the run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum StripOutcome {
    /// The run ended before this step
    #[default]
    Skipped,
    Applied(StripSummary),
    Failed(DataError),
}

impl StripOutcome {
    pub fn summary(&self) -> Option<&StripSummary> {
        match self {
            Self::Applied(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DataError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of the quantization step. Failure does not abort the run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum QuantizeOutcome {
    /// Not attempted: the run ended early or the image is already indexed
    #[default]
    Skipped,
    /// Quantized image kept
    Applied { psnr: MaybeInf },
    /// Quantized image scored below the quality threshold and was dropped
    Rejected { psnr: MaybeInf },
    Failed { error: DataError },
}

impl QuantizeOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Measured score, or 0 when nothing was measured.
    pub fn psnr(&self) -> f64 {
        match self {
            Self::Applied { psnr } | Self::Rejected { psnr } => psnr.value(),
            _ => 0.0,
        }
    }

    pub fn error(&self) -> Option<&DataError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Terminal state reached by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    AlreadyOptimized,
    CantOptimize,
    InspectionFailed,
    Optimized,
}

/// Result of an optimization run, fields in pipeline order.
///
/// Sizes are filled in as the run progresses, so an early terminal state
/// still reports everything measured up to that point.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    /// Original file size in bytes
    pub before_size: u64,
    pub already_optimized: bool,
    /// Tool named in the existing record
    pub already_optimized_by: Option<String>,
    pub strip: StripOutcome,
    pub size_after_strip: u64,
    pub quantize: QuantizeOutcome,
    pub size_after_quantize: u64,
    /// Embedding the record would not leave the file smaller than the original
    pub cant_optimize: bool,
    /// Final PSNR fell below the inspection floor
    pub inspection_failed: bool,
    /// PSNR between the original and the final pixels, once computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_psnr: Option<MaybeInf>,
    /// Size of the written file, 0 when nothing was written
    pub after_size: u64,
}

impl OptimizationResult {
    pub fn status(&self) -> RunStatus {
        if self.already_optimized {
            RunStatus::AlreadyOptimized
        } else if self.cant_optimize {
            RunStatus::CantOptimize
        } else if self.inspection_failed {
            RunStatus::InspectionFailed
        } else {
            RunStatus::Optimized
        }
    }

    /// Bytes saved (0 unless a file was written)
    pub fn saved_bytes(&self) -> i64 {
        if self.status() != RunStatus::Optimized {
            return 0;
        }
        self.before_size as i64 - self.after_size as i64
    }

    /// Compression ratio as a percentage (0 unless a file was written)
    pub fn compression_ratio(&self) -> f64 {
        if self.status() != RunStatus::Optimized {
            return 0.0;
        }
        reduction_percent(self.before_size, self.after_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_views() {
        assert!(!QuantizeOutcome::Skipped.applied());
        assert_eq!(QuantizeOutcome::Skipped.psnr(), 0.0);
        let applied = QuantizeOutcome::Applied { psnr: MaybeInf(47.5) };
        assert!(applied.applied());
        assert_eq!(applied.psnr(), 47.5);
        let rejected = QuantizeOutcome::Rejected { psnr: MaybeInf(30.0) };
        assert!(!rejected.applied());
        assert_eq!(rejected.psnr(), 30.0);
        let failed = QuantizeOutcome::Failed { error: DataError::MissingTerminalChunk };
        assert_eq!(failed.error(), Some(&DataError::MissingTerminalChunk));
    }

    #[test]
    fn status_and_savings() {
        let mut result = OptimizationResult {
            before_size: 1000,
            after_size: 600,
            ..Default::default()
        };
        assert_eq!(result.status(), RunStatus::Optimized);
        assert_eq!(result.saved_bytes(), 400);
        assert_eq!(result.compression_ratio(), 40.0);

        result.cant_optimize = true;
        assert_eq!(result.status(), RunStatus::CantOptimize);
        assert_eq!(result.saved_bytes(), 0);
    }

    #[test]
    fn serializes_tagged_outcomes() {
        let result = OptimizationResult {
            strip: StripOutcome::Applied(StripSummary { text_chunks: 2, ..Default::default() }),
            quantize: QuantizeOutcome::Rejected { psnr: MaybeInf(40.0) },
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["strip"]["status"], "applied");
        assert_eq!(json["strip"]["detail"]["textChunks"], 2);
        assert_eq!(json["quantize"]["status"], "rejected");
        assert_eq!(json["quantize"]["psnr"], 40.0);
        assert!(json.get("finalPsnr").is_none());
    }
}
