// src/fs/mock.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};

use super::FileSystem;

#[derive(Debug, Clone)]
enum MockEntry {
    /// A file with a fake modification time (seconds past the epoch).
    File { mtime_secs: u64 },
    /// A directory listing child names.
    Dir { children: Vec<String> },
}

/// In-memory filesystem for graph-build and staleness tests.
///
/// Paths are stored verbatim; tests should use absolute paths throughout.
/// Modification times are plain second offsets so tests can express
/// "output newer than input" without sleeping.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file with modification time `mtime_secs` past the epoch.
    pub fn add_file(&self, path: impl AsRef<Path>, mtime_secs: u64) {
        let path = path.as_ref().to_path_buf();
        let mut entries = self.entries.lock().unwrap();
        entries.insert(path.clone(), MockEntry::File { mtime_secs });
        Self::ensure_parents(&mut entries, &path);
    }

    /// Register an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(path.clone())
            .or_insert(MockEntry::Dir { children: Vec::new() });
        Self::ensure_parents(&mut entries, &path);
    }

    fn ensure_parents(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let mut current = path.to_path_buf();
        while let Some(parent) = current.parent().map(Path::to_path_buf) {
            if parent.as_os_str().is_empty() {
                break;
            }
            let name = match current.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => break,
            };
            let entry = entries
                .entry(parent.clone())
                .or_insert(MockEntry::Dir { children: Vec::new() });
            if let MockEntry::Dir { children } = entry {
                if !children.contains(&name) {
                    children.push(name);
                }
            }
            current = parent;
        }
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.entries.lock().unwrap().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(
            self.entries.lock().unwrap().get(path),
            Some(MockEntry::File { .. })
        )
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(
            self.entries.lock().unwrap().get(path),
            Some(MockEntry::Dir { .. })
        )
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        match self.entries.lock().unwrap().get(path) {
            Some(MockEntry::File { mtime_secs }) => {
                Some(UNIX_EPOCH + Duration::from_secs(*mtime_secs))
            }
            // Directories count as "exists" for staleness with epoch mtime.
            Some(MockEntry::Dir { .. }) => Some(UNIX_EPOCH),
            None => None,
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.entries.lock().unwrap().get(path) {
            Some(MockEntry::Dir { children }) => {
                let mut paths: Vec<PathBuf> =
                    children.iter().map(|name| path.join(name)).collect();
                paths.sort();
                Ok(paths)
            }
            _ => Err(anyhow!("not a directory or not found: {path:?}")),
        }
    }
}
