//! Error types for the PNG optimizer.
//!
//! Failures split into two kinds:
//! - [`DataError`]: the bytes are malformed or unsupported. Callers usually
//!   collect such files for analysis.
//! - [`OptimizerError::System`]: the environment failed (missing file,
//!   permissions, bad destination). These are operational faults.
//!
//! [`find_data_error`] walks any `source()` chain so the distinction survives
//! whatever wrapping a caller adds on top.

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Format or content problem with the data being processed.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum DataError {
    /// The first eight bytes are not the PNG signature
    #[error("missing PNG signature")]
    InvalidSignature,

    /// A chunk claims more bytes than remain in the input
    #[error("truncated chunk at offset {offset}: needs {needed} bytes, {available} available")]
    TruncatedChunk {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The chunk sequence never reaches IEND
    #[error("PNG file missing IEND chunk")]
    MissingTerminalChunk,

    /// Two images compared by the quality metric differ in size
    #[error("image dimensions differ: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        left_width: u32,
        left_height: u32,
        right_width: u32,
        right_height: u32,
    },

    /// Pixel layout the quantizer cannot take
    #[error("unsupported pixel layout: {0}")]
    UnsupportedPixelLayout(String),

    #[error("failed to decode PNG: {0}")]
    Decode(String),

    #[error("failed to encode PNG: {0}")]
    Encode(String),

    /// Comment record could not be serialized
    #[error("failed to serialize comment: {0}")]
    Comment(String),

    /// The quantization engine returned a non-OK status
    #[error(transparent)]
    Quantize(#[from] QuantizeError),

    /// The quantization engine returned something unusable
    #[error("invalid quantizer output: {0}")]
    QuantizerOutput(String),

    /// The metadata stripper failed
    #[error("failed to strip metadata: {0}")]
    Strip(String),
}

/// Non-OK status reported by a quantization engine.
///
/// Codes follow the libimagequant status table so engines backed by it can
/// pass their status straight through.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuantizeError {
    #[error("failed to quantize with QualityTooLow (code 99)")]
    QualityTooLow,
    #[error("failed to quantize with ValueOutOfRange (code 100)")]
    ValueOutOfRange,
    #[error("failed to quantize with OutOfMemory (code 101)")]
    OutOfMemory,
    #[error("failed to quantize with Aborted (code 102)")]
    Aborted,
    #[error("failed to quantize with InternalError (code 103)")]
    Internal,
    #[error("failed to quantize with BufferTooSmall (code 104)")]
    BufferTooSmall,
    #[error("failed to quantize with InvalidPointer (code 105)")]
    InvalidPointer,
    #[error("failed to quantize with Unsupported (code 106)")]
    Unsupported,
    #[error("failed to quantize with Unknown (code {0})")]
    Unknown(i32),
}

impl QuantizeError {
    /// Maps an engine status code to an error. `0` (OK) maps to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => None,
            99 => Some(Self::QualityTooLow),
            100 => Some(Self::ValueOutOfRange),
            101 => Some(Self::OutOfMemory),
            102 => Some(Self::Aborted),
            103 => Some(Self::Internal),
            104 => Some(Self::BufferTooSmall),
            105 => Some(Self::InvalidPointer),
            106 => Some(Self::Unsupported),
            other => Some(Self::Unknown(other)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::QualityTooLow => 99,
            Self::ValueOutOfRange => 100,
            Self::OutOfMemory => 101,
            Self::Aborted => 102,
            Self::Internal => 103,
            Self::BufferTooSmall => 104,
            Self::InvalidPointer => 105,
            Self::Unsupported => 106,
            Self::Unknown(code) => *code,
        }
    }
}

/// Main error type returned by hard-fail pipeline steps.
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// The input data is malformed or unsupported
    #[error("{context}: {source}")]
    Data {
        context: String,
        #[source]
        source: DataError,
    },

    /// File system failure
    #[error("{context}: {source}")]
    System {
        context: String,
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },
}

/// Convenience result type for optimizer operations.
pub type OptimizerResult<T> = Result<T, OptimizerError>;

// Helper methods for error creation
impl OptimizerError {
    pub fn data<T: Into<String>>(context: T, source: DataError) -> Self {
        Self::Data {
            context: context.into(),
            source,
        }
    }

    pub fn system<T: Into<String>>(context: T, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::System {
            context: context.into(),
            path: Some(path.as_ref().to_path_buf()),
            source,
        }
    }

    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn as_data_error(&self) -> Option<&DataError> {
        match self {
            Self::Data { source, .. } => Some(source),
            Self::System { .. } => None,
        }
    }

    /// Path involved in a system failure, if known.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::System { path, .. } => path.as_deref(),
            Self::Data { .. } => None,
        }
    }
}

// Convert std::io::Error to OptimizerError
impl From<io::Error> for OptimizerError {
    fn from(err: io::Error) -> Self {
        Self::System {
            context: "IO error".to_string(),
            path: None,
            source: err,
        }
    }
}

// Reports and JSON output carry errors as their display string.
impl Serialize for OptimizerError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Finds a [`DataError`] anywhere in an error's source chain.
///
/// Works through `OptimizerError`, `anyhow` contexts and any other wrapper
/// that reports its cause via `source()`.
pub fn find_data_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a DataError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(data) = e.downcast_ref::<DataError>() {
            return Some(data);
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Error, Debug)]
    #[error("wrapper: {0}")]
    struct Wrapper(#[source] OptimizerError);

    fn returned(is_data: bool) -> OptimizerError {
        if is_data {
            OptimizerError::data("failed to read PNG comment", DataError::InvalidSignature)
        } else {
            OptimizerError::system(
                "failed to read PNG file",
                "/nope.png",
                io::Error::new(io::ErrorKind::NotFound, "not found"),
            )
        }
    }

    #[test]
    fn classifies_data_and_system_errors() {
        assert!(returned(true).is_data_error());
        assert!(!returned(false).is_data_error());
        assert_eq!(returned(true).as_data_error(), Some(&DataError::InvalidSignature));
        assert_eq!(returned(false).path(), Some(Path::new("/nope.png")));
    }

    #[test]
    fn data_error_found_through_wrappers() {
        let wrapped = Wrapper(returned(true));
        assert_eq!(find_data_error(&wrapped), Some(&DataError::InvalidSignature));

        let twice = anyhow::Error::new(returned(true))
            .context("inner")
            .context("outer");
        assert!(find_data_error(&*twice).is_some());

        let system = anyhow::Error::new(returned(false)).context("outer");
        assert!(find_data_error(&*system).is_none());
    }

    #[test]
    fn quantize_codes_round_trip() {
        assert_eq!(QuantizeError::from_code(0), None);
        for code in 99..=106 {
            let err = QuantizeError::from_code(code).unwrap();
            assert_eq!(err.code(), code);
        }
        assert_eq!(QuantizeError::from_code(7), Some(QuantizeError::Unknown(7)));
        assert_eq!(
            QuantizeError::Aborted.to_string(),
            "failed to quantize with Aborted (code 102)"
        );
    }

    #[test]
    fn display_keeps_context() {
        let err = returned(true);
        assert_eq!(err.to_string(), "failed to read PNG comment: missing PNG signature");
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            "\"failed to read PNG comment: missing PNG signature\""
        );
    }
}
