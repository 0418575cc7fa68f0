//! Configuration loading and validation.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

use persistence::DatabaseConfig;
use shared::jwt::TokenCodec;
use storage::file::FileStorageConfig;
use storage::kv::{MemoryStorage, RedisStorage, Storage, StorageError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Token verification settings; absent when the deployment handles
    /// authentication elsewhere.
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Google login flow settings; requires `auth` for token signing.
    #[serde(default)]
    pub login: Option<LoginConfig>,

    /// Refresh token cookie attributes.
    #[serde(default)]
    pub cookie: CookieConfig,

    /// Database pool settings, handed through to the persistence crate.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Key-value backend for refresh tokens and the ETag cache.
    #[serde(default)]
    pub storage: StorageConfig,

    /// File storage backend settings.
    #[serde(default)]
    pub files: Option<FileStorageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Comma-separated origin patterns compiled as regular expressions.
    /// Empty means any origin without credentials, for development.
    #[serde(default)]
    pub cors_origins: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// PEM private key for signing tokens.
    pub private_key: String,

    /// PEM public key for verifying tokens.
    pub public_key: String,

    /// Signing algorithm name, e.g. RS256.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Additional algorithms accepted during verification.
    #[serde(default)]
    pub allowed_algorithms: Vec<String>,

    /// Clock skew tolerance in seconds.
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,

    /// Cookie also searched for bearer tokens. Empty disables the lookup.
    #[serde(default)]
    pub token_cookie: String,
}

impl AuthConfig {
    /// Builds the token codec for these settings.
    pub fn codec(&self) -> Result<TokenCodec, ConfigValidationError> {
        let algorithm = parse_algorithm(&self.algorithm)?;
        let mut codec = TokenCodec::from_rsa_pem(&self.private_key, &self.public_key, algorithm)
            .map_err(|e| ConfigValidationError::InvalidValue(e.to_string()))?
            .with_leeway(self.leeway_secs);

        if !self.allowed_algorithms.is_empty() {
            let allowed = self
                .allowed_algorithms
                .iter()
                .map(|name| parse_algorithm(name))
                .collect::<Result<Vec<_>, _>>()?;
            codec = codec.with_allowed_algorithms(allowed);
        }

        Ok(codec)
    }

    /// Name of the token cookie, if one is configured.
    pub fn cookie_name(&self) -> Option<&str> {
        if self.token_cookie.is_empty() {
            None
        } else {
            Some(&self.token_cookie)
        }
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, ConfigValidationError> {
    name.parse::<Algorithm>()
        .map_err(|_| ConfigValidationError::InvalidValue(format!("Unknown JWT algorithm: {}", name)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    /// Tokeninfo endpoint; the access token is appended verbatim.
    #[serde(default = "default_token_info_url")]
    pub token_info_url: String,

    /// Access token expiration in seconds (default: 3600 = 1 hour).
    #[serde(default = "default_token_duration")]
    pub token_duration_secs: i64,

    /// Refresh token expiration in seconds (default: 2592000 = 30 days).
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,

    #[serde(default = "default_cookie_path")]
    pub path: String,

    #[serde(default = "default_cookie_secure")]
    pub secure: bool,

    #[serde(default = "default_same_site")]
    pub same_site: String,

    /// Cookie domain; empty omits the attribute.
    #[serde(default)]
    pub domain: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            path: default_cookie_path(),
            secure: default_cookie_secure(),
            same_site: default_same_site(),
            domain: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend kind: memory or redis.
    #[serde(default = "default_storage_kind")]
    pub kind: String,

    #[serde(default)]
    pub redis: Option<storage::kv::RedisConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: default_storage_kind(),
            redis: None,
        }
    }
}

impl StorageConfig {
    /// Builds the configured key-value backend.
    pub async fn build(&self) -> Result<Arc<dyn Storage>, ConfigValidationError> {
        match self.kind.as_str() {
            "memory" => Ok(Arc::new(MemoryStorage::new())),
            "redis" => {
                let redis = self.redis.clone().ok_or_else(|| {
                    ConfigValidationError::MissingRequired("storage.redis".to_string())
                })?;
                let backend = RedisStorage::connect(&redis).await?;
                Ok(Arc::new(backend))
            }
            other => Err(ConfigValidationError::InvalidValue(format!(
                "Unknown storage kind: {}",
                other
            ))),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    1_048_576
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_algorithm() -> String {
    "RS256".to_string()
}
fn default_jwt_leeway() -> u64 {
    30
}
fn default_token_info_url() -> String {
    "https://oauth2.googleapis.com/tokeninfo?access_token=".to_string()
}
fn default_token_duration() -> i64 {
    3600
}
fn default_refresh_token_expiry() -> u64 {
    2_592_000
}
fn default_cookie_name() -> String {
    "refresh_token".to_string()
}
fn default_cookie_path() -> String {
    "/".to_string()
}
fn default_cookie_secure() -> bool {
    true
}
fn default_same_site() -> String {
    "Strict".to_string()
}
fn default_storage_kind() -> String {
    "memory".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Storage initialization failed: {0}")]
    Storage(#[from] StorageError),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with BP__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("BP").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds entirely from embedded defaults so tests never depend on
    /// config files being present.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30
            max_body_size = 1048576
            cors_origins = ""

            [logging]
            level = "info"
            format = "json"

            [cookie]
            name = "refresh_token"
            path = "/"
            secure = true
            same_site = "Strict"

            [storage]
            kind = "memory"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.storage.kind == "redis" && self.storage.redis.is_none() {
            return Err(ConfigValidationError::MissingRequired(
                "storage.redis is required when storage.kind is redis".to_string(),
            ));
        }

        if let Some(auth) = &self.auth {
            if auth.private_key.is_empty() || auth.public_key.is_empty() {
                return Err(ConfigValidationError::MissingRequired(
                    "auth.private_key and auth.public_key must be set".to_string(),
                ));
            }
        }

        if self.login.is_some() && self.auth.is_none() {
            return Err(ConfigValidationError::MissingRequired(
                "auth section is required when login is configured".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .expect("Invalid socket address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_loads_with_defaults() {
        let config = Config::load_for_test(&[]).expect("Failed to load config");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.cookie.name, "refresh_token");
        assert_eq!(config.storage.kind, "memory");
        assert!(config.auth.is_none());
        assert!(config.database.is_none());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let config = Config::load_for_test(&[
            ("server.port", "9000"),
            ("logging.level", "debug"),
            ("cookie.name", "bp_refresh"),
        ])
        .expect("Failed to load config");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.cookie.name, "bp_refresh");
    }

    #[test]
    fn validation_rejects_port_zero() {
        let config =
            Config::load_for_test(&[("server.port", "0")]).expect("Failed to load config");

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("port"));
    }

    #[test]
    fn validation_requires_redis_section() {
        let config =
            Config::load_for_test(&[("storage.kind", "redis")]).expect("Failed to load config");

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("storage.redis"));
    }

    #[test]
    fn validation_requires_auth_keys() {
        let config = Config::load_for_test(&[
            ("auth.private_key", ""),
            ("auth.public_key", ""),
        ])
        .expect("Failed to load config");

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("auth.private_key"));
    }

    #[test]
    fn validation_ties_login_to_auth() {
        let config = Config::load_for_test(&[("login.token_duration_secs", "600")])
            .expect("Failed to load config");

        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("auth section"));
    }

    #[test]
    fn login_defaults() {
        let config = Config::load_for_test(&[("login.token_duration_secs", "600")])
            .expect("Failed to load config");

        let login = config.login.unwrap();
        assert_eq!(login.token_duration_secs, 600);
        assert_eq!(login.refresh_token_expiry_secs, 2_592_000);
        assert!(login.token_info_url.contains("googleapis.com"));
    }

    #[test]
    fn empty_token_cookie_disables_lookup() {
        let auth = AuthConfig {
            private_key: "key".to_string(),
            public_key: "key".to_string(),
            algorithm: default_algorithm(),
            allowed_algorithms: Vec::new(),
            leeway_secs: 30,
            token_cookie: String::new(),
        };
        assert!(auth.cookie_name().is_none());

        let auth = AuthConfig {
            token_cookie: "session".to_string(),
            ..auth
        };
        assert_eq!(auth.cookie_name(), Some("session"));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        assert!(parse_algorithm("RS256").is_ok());
        assert!(parse_algorithm("HS512").is_ok());
        assert!(parse_algorithm("none").is_err());
    }

    #[tokio::test]
    async fn storage_config_builds_memory_backend() {
        let storage = StorageConfig::default().build().await.unwrap();
        storage.set("k", "v").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn storage_config_rejects_unknown_kind() {
        let config = StorageConfig {
            kind: "etcd".to_string(),
            redis: None,
        };
        assert!(config.build().await.is_err());
    }

    #[test]
    fn socket_addr_formats_host_and_port() {
        let config = Config::load_for_test(&[
            ("server.host", "127.0.0.1"),
            ("server.port", "3000"),
        ])
        .expect("Failed to load config");

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }
}
