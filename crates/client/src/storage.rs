//! Persistent key/value storage.
//!
//! Values are JSON files in a single directory. By default that is the
//! platform config directory:
//!   - Linux: `~/.config/rideshare/`
//!   - macOS: `~/Library/Application Support/rideshare/`
//!   - Windows: `%APPDATA%\rideshare\`

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::StorageError;

const APP_DIR: &str = "rideshare";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the platform config directory.
    pub fn default_location() -> Result<Self, StorageError> {
        let config_dir = dirs::config_dir().ok_or(StorageError::NoDirectory)?;
        Ok(Self::new(config_dir.join(APP_DIR)))
    }

    /// `root` when given, otherwise the platform default.
    pub fn at(root: Option<&Path>) -> Result<Self, StorageError> {
        match root {
            Some(dir) => Ok(Self::new(dir)),
            None => Self::default_location(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.root.join(format!("{safe_key}.json"))
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value)?;
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.file_path(key), json)?;
        Ok(())
    }

    /// Load a value. A missing key is `Ok(None)`; unreadable or corrupt
    /// content is an error.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let json = match std::fs::read_to_string(self.file_path(key)) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Remove a value; removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.file_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).is_file()
    }
}
