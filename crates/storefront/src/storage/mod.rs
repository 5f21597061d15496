//! Durable local key-value storage.
//!
//! Holds two things, under separate keys:
//! - the guest session ID ([`keys::GUEST_SESSION_ID`]), kept indefinitely
//! - the last known cart snapshot ([`keys::CART_CACHE`]), a best-effort mirror
//!   used when the remote cart store cannot be reached
//!
//! The storage backend is injected so tests can use [`MemoryStore`].

mod cart_cache;
mod file;
mod memory;

pub use cart_cache::CartCache;
pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Storage keys.
pub mod keys {
    /// Key for the persisted guest session ID.
    pub const GUEST_SESSION_ID: &str = "guestSessionId";

    /// Key for the cached cart snapshot.
    pub const CART_CACHE: &str = "organicCart";
}

/// Errors that can occur when reading or writing local storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store refuses writes (quota exceeded, private mode, read-only media).
    #[error("Storage is read-only")]
    ReadOnly,
}

/// Synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
