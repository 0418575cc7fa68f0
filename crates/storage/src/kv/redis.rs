//! Redis storage backend.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{Storage, StorageError};

/// Connection settings for the Redis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logical database index.
    #[serde(default)]
    pub db: i64,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_port() -> u16 {
    6379
}

fn default_connect_timeout() -> u64 {
    5
}

impl RedisConfig {
    /// Builds the connection URL for this configuration.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Networked backend over a managed Redis connection.
///
/// The connection manager reconnects on failure; `dispose` drops it, which
/// closes the underlying connection.
pub struct RedisStorage {
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisStorage {
    /// Connects to Redis with the configured timeout.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StorageError> {
        let client = redis::Client::open(config.url())?;

        let connection = tokio::time::timeout(
            std::time::Duration::from_secs(config.connect_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| {
            StorageError::Backend(format!(
                "Connection to {}:{} timed out",
                config.host, config.port
            ))
        })??;

        tracing::debug!(host = %config.host, port = config.port, "Connected to redis");

        Ok(Self {
            connection: Mutex::new(Some(connection)),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StorageError> {
        self.connection
            .lock()
            .await
            .clone()
            .ok_or(StorageError::Disposed)
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn expire_in(&self, key: &str, seconds: u64) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: () = conn.expire(key, seconds as i64).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    async fn dispose(&self) -> Result<(), StorageError> {
        self.connection.lock().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_without_password() {
        let config = RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            connect_timeout_secs: 5,
        };

        assert_eq!(config.url(), "redis://localhost:6379/0");
    }

    #[test]
    fn test_url_with_password() {
        let config = RedisConfig {
            host: "cache.internal".to_string(),
            port: 6380,
            db: 2,
            password: Some("s3cret".to_string()),
            connect_timeout_secs: 5,
        };

        assert_eq!(config.url(), "redis://:s3cret@cache.internal:6380/2");
    }

    #[test]
    fn test_config_defaults() {
        let config: RedisConfig = serde_json::from_value(serde_json::json!({
            "host": "localhost"
        }))
        .unwrap();

        assert_eq!(config.port, 6379);
        assert_eq!(config.db, 0);
        assert_eq!(config.password, None);
        assert_eq!(config.connect_timeout_secs, 5);
    }
}
