//! Local preference storage
//!
//! The client keeps its private signing key and its trusted users in a single
//! flat string key/value record. This module provides:
//! - The `PreferenceStore` abstraction shared by the key manager and trust store
//! - A JSON file backend (`chatdata.json` by default)
//! - An in-memory backend for tests and ephemeral sessions
//!
//! A store handle is constructed explicitly by the owner of a client session and
//! handed to the components that need it.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

/// Logical key holding the serialized private signing key.
pub const PRIVATE_KEY: &str = "private_key";

/// Logical key holding the serialized trusted users sequence.
pub const TRUSTED_USERS: &str = "trusted_users";

/// Default preference file name.
pub const DEFAULT_FILE_NAME: &str = "chatdata.json";

/// Preference store errors
#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preference file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Preference store lock poisoned")]
    Poisoned,
}

/// String key/value storage used for local client state.
///
/// Writes made with `set_string` are only guaranteed durable after `save`.
pub trait PreferenceStore: Send + Sync {
    /// Get a value, `None` if the key was never set
    fn get_string(&self, key: &str) -> Result<Option<String>, PrefsError>;

    /// Set a value in memory
    fn set_string(&self, key: &str, value: &str) -> Result<(), PrefsError>;

    /// Persist all values
    fn save(&self) -> Result<(), PrefsError>;

    /// Get a value or fall back to `default`
    fn get_string_or(&self, key: &str, default: &str) -> Result<String, PrefsError> {
        Ok(self.get_string(key)?.unwrap_or_else(|| default.to_string()))
    }
}

type Values = BTreeMap<String, String>;

/// JSON file backed preference store.
///
/// The file is read lazily on first access. A missing file is treated as an
/// empty store.
pub struct JsonFilePrefs {
    path: PathBuf,
    values: Mutex<Option<Values>>,
}

impl JsonFilePrefs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: Mutex::new(None),
        }
    }

    /// Default preference file location in the platform data directory
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "signchat", "signchat")
            .map(|dirs| dirs.data_dir().join(DEFAULT_FILE_NAME))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Values>>, PrefsError> {
        self.values.lock().map_err(|_| PrefsError::Poisoned)
    }

    fn read_file(&self) -> Result<Values, PrefsError> {
        if !self.path.exists() {
            return Ok(Values::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| PrefsError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn loaded<'a>(
        &self,
        guard: &'a mut MutexGuard<'_, Option<Values>>,
    ) -> Result<&'a mut Values, PrefsError> {
        if guard.is_none() {
            **guard = Some(self.read_file()?);
        }
        Ok(guard.get_or_insert_with(Values::new))
    }
}

impl PreferenceStore for JsonFilePrefs {
    fn get_string(&self, key: &str) -> Result<Option<String>, PrefsError> {
        let mut guard = self.lock()?;
        let values = self.loaded(&mut guard)?;
        Ok(values.get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        let mut guard = self.lock()?;
        let values = self.loaded(&mut guard)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn save(&self) -> Result<(), PrefsError> {
        let guard = self.lock()?;
        // Nothing was ever loaded or set
        let Some(values) = guard.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(values)
            .map_err(|e| PrefsError::Serialization(e.to_string()))?;

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("tmp");
        if let Err(e) = write_private(&temp_path, json.as_bytes())
            .and_then(|()| fs::rename(&temp_path, &self.path))
        {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), keys = values.len(), "Saved preferences");
        Ok(())
    }
}

/// Write `contents` to a fresh file readable only by the owner on Unix.
///
/// The record holds private key material, so the file is never visible with
/// wider permissions, not even before the rename.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    // A stale file from an earlier crash would keep its old mode
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// In-memory preference store
#[derive(Default)]
pub struct MemoryPrefs {
    values: Mutex<Values>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with values
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl PreferenceStore for MemoryPrefs {
    fn get_string(&self, key: &str) -> Result<Option<String>, PrefsError> {
        let values = self.values.lock().map_err(|_| PrefsError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        let mut values = self.values.lock().map_err(|_| PrefsError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn save(&self) -> Result<(), PrefsError> {
        Ok(())
    }
}
