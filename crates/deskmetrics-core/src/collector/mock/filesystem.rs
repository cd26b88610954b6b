//! In-memory mock filesystem for testing the adapter without real sysfs.
//!
//! `MockFs` simulates a filesystem in memory, so adapter tests run on any
//! platform and in CI without sensor hardware.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Entries {
    files: HashMap<PathBuf, String>,
    directories: HashSet<PathBuf>,
}

/// In-memory filesystem for testing.
///
/// Clones share the same contents, so a test can keep a handle and change
/// sensor files after the adapter has been opened.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    entries: Arc<RwLock<Entries>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut entries = self.write();
        insert_parents(&mut entries.directories, &path);
        entries.files.insert(path, content.into());
    }

    /// Removes a file, simulating a sensor that disappeared.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.write().files.remove(path.as_ref());
    }

    /// Adds an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut entries = self.write();
        insert_parents(&mut entries.directories, &path);
        entries.directories.insert(path);
    }

    /// Adds a hwmon chip directory `<sys>/class/hwmon/hwmon<index>` with a
    /// `name` file and the given sensor attributes.
    ///
    /// # Arguments
    /// * `sys_root` - Base path of the sysfs tree (usually "/sys")
    /// * `index` - hwmon index
    /// * `name` - Driver name written to the `name` attribute
    /// * `attributes` - `(file name, content)` pairs, e.g. `("temp1_input", "45000")`
    ///
    /// Returns the chip directory.
    pub fn add_hwmon_chip(
        &self,
        sys_root: &str,
        index: usize,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> PathBuf {
        let dir = PathBuf::from(format!("{}/class/hwmon/hwmon{}", sys_root, index));
        self.add_dir(&dir);
        self.add_file(dir.join("name"), format!("{}\n", name));
        for (file, content) in attributes {
            self.add_file(dir.join(file), format!("{}\n", content));
        }
        dir
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Entries> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Entries> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn insert_parents(directories: &mut HashSet<PathBuf>, path: &Path) {
    let mut parent = path.parent();
    while let Some(p) = parent {
        if !p.as_os_str().is_empty() {
            directories.insert(p.to_path_buf());
        }
        parent = p.parent();
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read().files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        let entries = self.read();
        entries.files.contains_key(path) || entries.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = self.read();
        if !entries.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let mut children = HashSet::new();

        for file_path in entries.files.keys() {
            if file_path.parent().is_some_and(|parent| parent == path) {
                children.insert(file_path.clone());
            }
        }

        for dir_path in &entries.directories {
            if dir_path.parent().is_some_and(|parent| parent == path) && dir_path != path {
                children.insert(dir_path.clone());
            }
        }

        Ok(children.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_add_file() {
        let fs = MockFs::new();
        fs.add_file("/sys/class/hwmon/hwmon0/name", "k10temp\n");

        assert!(fs.exists(Path::new("/sys/class/hwmon/hwmon0/name")));
        assert!(fs.exists(Path::new("/sys/class/hwmon")));

        let content = fs
            .read_to_string(Path::new("/sys/class/hwmon/hwmon0/name"))
            .unwrap();
        assert_eq!(content, "k10temp\n");
    }

    #[test]
    fn test_mock_fs_read_dir() {
        let fs = MockFs::new();
        fs.add_file("/sys/class/hwmon/hwmon0/temp1_input", "1");
        fs.add_file("/sys/class/hwmon/hwmon0/temp1_label", "Tctl");
        fs.add_file("/sys/class/hwmon/hwmon1/temp1_input", "2");

        let chips = fs.read_dir(Path::new("/sys/class/hwmon")).unwrap();
        assert_eq!(chips.len(), 2);

        let attrs = fs.read_dir(Path::new("/sys/class/hwmon/hwmon0")).unwrap();
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_add_hwmon_chip() {
        let fs = MockFs::new();
        let dir = fs.add_hwmon_chip("/sys", 3, "nvme", &[("temp1_input", "38850")]);

        assert_eq!(dir, PathBuf::from("/sys/class/hwmon/hwmon3"));
        assert_eq!(fs.read_to_string(&dir.join("name")).unwrap(), "nvme\n");
        assert_eq!(
            fs.read_to_string(&dir.join("temp1_input")).unwrap(),
            "38850\n"
        );
    }

    #[test]
    fn test_clones_share_contents() {
        let fs = MockFs::new();
        let handle = fs.clone();
        handle.add_file("/proc/stat", "cpu 1 2 3 4\n");
        assert!(fs.exists(Path::new("/proc/stat")));

        handle.remove_file("/proc/stat");
        assert!(!fs.exists(Path::new("/proc/stat")));
    }

    #[test]
    fn test_mock_fs_not_found() {
        let fs = MockFs::new();
        let result = fs.read_to_string(Path::new("/nonexistent"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
