use std::io;
use std::path::Path;

use crate::core::ImageTask;
use crate::utils::{OptimizerError, OptimizerResult};

/// Validates a batch task before it is handed to the pipeline.
///
/// Only the input is checked. A missing destination directory surfaces as a
/// write failure once the pipeline has reached its last step.
pub fn validate_task(task: &ImageTask) -> OptimizerResult<()> {
    validate_input_path(&task.input_path)
}

/// Validates that the input exists and is a regular file
pub fn validate_input_path(path: impl AsRef<Path>) -> OptimizerResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(OptimizerError::system(
            "input file does not exist",
            path,
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }

    if !path.is_file() {
        return Err(OptimizerError::system(
            "input path is not a file",
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    Ok(())
}
