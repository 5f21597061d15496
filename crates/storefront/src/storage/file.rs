//! File-backed key-value store.
//!
//! All entries live in one JSON object on disk. Writes go to a temporary file
//! in the same directory and are renamed over the original, so a crash never
//! leaves a half-written file behind. A file that no longer parses is moved
//! aside to `<name>.corrupt` and the store starts over empty.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::{KeyValueStore, StorageError};

/// [`KeyValueStore`] persisted as a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) a store at `path`.
    ///
    /// The parent directory is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or an
    /// existing file cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        // Surface read errors and set aside a corrupt file up front.
        store.read_all()?;
        Ok(store)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    self.quarantine(&e)?;
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Path a corrupt file is moved to.
    #[must_use]
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }

    fn quarantine(&self, error: &serde_json::Error) -> Result<(), StorageError> {
        let target = self.corrupt_path();
        warn!(
            path = %self.path.display(),
            moved_to = %target.display(),
            error = %error,
            "Storage file is corrupt, starting over"
        );
        match fs::rename(&self.path, &target) {
            Ok(()) => Ok(()),
            // Another reader got there first.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Storage file written");
        Ok(())
    }

    fn modify(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }
}
