//! Key-value storage facade.
//!
//! Everything above this module takes an `Arc<dyn Storage>` and must not
//! depend on which backend is active.

mod memory;
mod redis;

pub use self::memory::MemoryStorage;
pub use self::redis::{RedisConfig, RedisStorage};

use async_trait::async_trait;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage has been disposed")]
    Disposed,
}

/// Uniform key-value contract implemented by every backend.
///
/// Values are opaque strings; callers serialize structured payloads
/// themselves. Access is per-key with last-write-wins semantics and no
/// guarantees across keys.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stores a value under a key, replacing any previous value and
    /// clearing any time-to-live.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Fetches the value for a key, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Sets a time-to-live on an existing key. Missing keys are ignored.
    async fn expire_in(&self, key: &str, seconds: u64) -> Result<(), StorageError>;

    /// Removes a key.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Releases backend resources. Operations after dispose fail with
    /// [`StorageError::Disposed`].
    async fn dispose(&self) -> Result<(), StorageError>;
}
