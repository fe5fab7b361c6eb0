//! Core types shared by the pipeline and its callers.
//!
//! - [`LightFileComment`] / [`MaybeInf`]: the record embedded in optimized files
//! - [`QualityLevel`] / [`OptimizerConfig`]: quantization gating and settings
//! - [`OptimizationResult`]: per-run outcome with tagged soft-fail steps
//! - [`ImageTask`]: one entry of a batch

pub mod comment;
pub mod quality;
mod task;
mod types;

pub use comment::{COMMENT_KEYWORD, LightFileComment, MaybeInf, TOOL_NAME};
pub use quality::{INSPECTION_FLOOR_DB, OptimizerConfig, QualityLevel};
pub use task::ImageTask;
pub use types::{OptimizationResult, QuantizeOutcome, RunStatus, StripOutcome, StripSummary};
