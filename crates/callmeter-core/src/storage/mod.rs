//! Client-side persistence.
//!
//! A [`KeyValueStore`] stands in for browser storage: opaque string values
//! under short string keys. The wallet accessor layers a typed, fail-soft
//! record on top of it.

mod file;
mod memory;
mod wallet;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use wallet::{Wallet, WalletAccessor, WalletStore, DEFAULT_CURRENCY_LABEL, WALLET_KEY};

/// Error type for key-value storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key contains characters outside `[A-Za-z0-9_-]` or is empty
    #[error("invalid storage key: '{0}'")]
    InvalidKey(String),

    /// The backing medium could not be read or written
    #[error("storage I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Minimal string key-value storage.
///
/// Implementations are shared process-wide without coordination; concurrent
/// writers to the same key resolve as last-writer-wins.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, `None` if absent
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key` (no-op if absent)
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// Reject keys that could escape a storage directory.
///
/// Only alphanumeric characters, `-`, and `_` are allowed.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
