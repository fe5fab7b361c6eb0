pub mod error;
pub mod fs;
pub mod logger;
pub mod size;
pub mod validation;

pub use error::{DataError, OptimizerError, OptimizerResult, QuantizeError, find_data_error};
pub use fs::{extract_filename, get_file_size, read_file, write_file};
pub use logger::{LogSink, TracingSink};
pub use size::{format_bytes, reduction_percent, sizes_within_1_percent, sizes_within_tolerance};
pub use validation::{validate_input_path, validate_task};
