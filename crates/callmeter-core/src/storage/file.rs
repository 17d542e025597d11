//! Directory-backed key-value store.
//!
//! Each key maps to `<dir>/<key>.json`. Writes go through a temp file and a
//! rename so readers never observe a partially written value.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{validate_key, KeyValueStore, StorageError};

/// Key-value store persisted as one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`.
    ///
    /// The directory is created on the first write, not here.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Ensure the storage directory exists with owner-only permissions
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if self.dir.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700)).map_err(
                |source| StorageError::Io {
                    path: self.dir.clone(),
                    source,
                },
            )?;
        }
        debug!("Created storage directory {:?}", self.dir);
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        self.ensure_dir()?;

        let temp_path = path.with_extension("tmp");
        let io_err = |source: std::io::Error| StorageError::Io {
            path: temp_path.clone(),
            source,
        };

        // Leftover from a previous failed write
        let _ = fs::remove_file(&temp_path);

        // O_CREAT|O_EXCL so a planted symlink is never followed
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(io_err)?;
        file.write_all(value.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        fs::rename(&temp_path, &path).map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
