//! Local fallback store.
//!
//! A synchronous key → JSON-string medium. Callers treat every failure here
//! as recoverable: reads degrade to "absent", writes degrade to a warning.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Errors raised by a [`LocalStore`].
#[derive(Debug, Error)]
pub enum LocalStoreError {
    /// The medium is disabled or otherwise unreachable.
    #[error("local store unavailable: {0}")]
    Unavailable(String),

    /// Writing would exceed the medium's capacity.
    #[error("local store full: writing {needed} bytes would exceed {limit} bytes")]
    QuotaExceeded {
        /// Bytes the store would hold after the write.
        needed: usize,
        /// Configured capacity.
        limit: usize,
    },

    /// Filesystem error.
    #[error("local store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Synchronous key-value medium holding JSON strings.
pub trait LocalStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the medium is unavailable or full.
    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the medium is unavailable.
    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-process store, optionally capacity-limited.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
    unavailable: bool,
}

impl MemoryStore {
    /// Create an empty, unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes once keys plus values exceed `bytes`.
    #[must_use]
    pub fn with_capacity_bytes(bytes: usize) -> Self {
        Self {
            capacity_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Create a store whose every operation fails, like a disabled browser store.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Number of stored keys (0 when unavailable).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, LocalStoreError> {
        if self.unavailable {
            return Err(LocalStoreError::Unavailable("store disabled".to_owned()));
        }
        self.entries
            .lock()
            .map_err(|_| LocalStoreError::Unavailable("store lock poisoned".to_owned()))
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut entries = self.lock()?;

        if let Some(limit) = self.capacity_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > limit {
                return Err(LocalStoreError::QuotaExceeded { needed, limit });
            }
        }

        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// One file per key inside a directory.
///
/// No cross-process locking: the last writer wins.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the store's files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys are form-urlencoded into file names, so distinct keys never
    /// share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != IoErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
