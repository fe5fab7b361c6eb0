use std::fs;
use std::path::Path;

use crate::utils::{OptimizerError, OptimizerResult};

/// Reads the whole file into memory.
pub fn read_file(path: impl AsRef<Path>) -> OptimizerResult<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| OptimizerError::system("failed to read PNG file", path, e))
}

/// Writes `data` to `path`. The parent directory must already exist.
pub fn write_file(path: impl AsRef<Path>, data: &[u8]) -> OptimizerResult<()> {
    let path = path.as_ref();
    fs::write(path, data).map_err(|e| OptimizerError::system("failed to write optimized PNG", path, e))
}

/// Get file size in bytes
pub fn get_file_size(path: impl AsRef<Path>) -> OptimizerResult<u64> {
    let path = path.as_ref();
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| OptimizerError::system("failed to stat destination file", path, e))
}

/// Get file name for log lines, falling back to the full path
pub fn extract_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_system_error() {
        let err = read_file("/definitely/not/here.png").unwrap_err();
        assert!(!err.is_data_error());
        assert_eq!(err.path(), Some(Path::new("/definitely/not/here.png")));
    }

    #[test]
    fn write_does_not_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.png");
        let err = write_file(&target, b"data").unwrap_err();
        assert!(!err.is_data_error());
        assert!(!target.parent().unwrap().exists());
    }

    #[test]
    fn write_then_stat() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.png");
        write_file(&target, b"12345").unwrap();
        assert_eq!(get_file_size(&target).unwrap(), 5);
        assert_eq!(extract_filename(&target), "out.png");
    }
}
