// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod processing;
pub mod commands;

// Public exports for external consumers
pub use core::{
    ImageTask, LightFileComment, MaybeInf, OptimizationResult, OptimizerConfig, QualityLevel,
    QuantizeOutcome, RunStatus, StripOutcome, StripSummary,
};
pub use processing::{MetadataStripper, Optimizer, Quantizer, optimize};
pub use utils::{DataError, LogSink, OptimizerError, OptimizerResult, QuantizeError, find_data_error};
pub use commands::{BatchSummary, TaskReport, optimize_image, optimize_images};

// This library file is the public API; the command-line entry point is in main.rs.
