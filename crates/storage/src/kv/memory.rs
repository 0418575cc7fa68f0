//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Storage, StorageError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Ephemeral backend living for the process lifetime.
///
/// Expired entries are dropped lazily on read. Doubles as the test stand-in
/// for the networked backend.
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Entry>>,
    disposed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> Result<(), StorageError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(StorageError::Disposed);
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.ensure_live()?;
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.ensure_live()?;
        let mut entries = self.entries.lock().await;

        let expired = entries.get(key).is_some_and(|e| e.is_expired());
        if expired {
            entries.remove(key);
            return Ok(None);
        }

        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    async fn expire_in(&self, key: &str, seconds: u64) -> Result<(), StorageError> {
        self.ensure_live()?;
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_live()?;
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.ensure_live()?;
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn dispose(&self) -> Result<(), StorageError> {
        self.disposed.store(true, Ordering::SeqCst);
        self.entries.lock().await.clear();
        Ok(())
    }
}
