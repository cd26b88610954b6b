//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait lets the hwmon adapter read either the real
//! `/sys` and `/proc` trees on Linux or an in-memory mock in tests.

use std::io;
use std::path::{Path, PathBuf};

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// Symlinked entries (as found under `/sys/class/hwmon`) are returned
    /// as-is, not resolved.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("temp1_input");
        std::fs::write(&file, "42000\n").unwrap();

        let fs = RealFs::new();
        assert!(fs.exists(&file));
        assert_eq!(fs.read_to_string(&file).unwrap(), "42000\n");

        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![file]);
    }

    #[test]
    fn test_real_fs_missing() {
        let fs = RealFs::new();
        assert!(!fs.exists(Path::new("/nonexistent/path/12345")));
        assert!(fs.read_dir(Path::new("/nonexistent/path/12345")).is_err());
    }
}
