//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Default chunk size (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default per-file limit (15 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 15 * 1024 * 1024;

/// Default per-user limit (45 MiB).
pub const DEFAULT_MAX_USER_BYTES: u64 = 45 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Document store configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Storage limits.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Archival sweeper configuration.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which document store backend to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store; contents are lost on restart.
    #[default]
    Memory,
    /// `PostgreSQL` through sea-orm.
    Postgres,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StoreBackend,
    /// `PostgreSQL` connection URL (required for the postgres backend).
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Storage limits and transaction policy.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Size of every chunk but the last, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Per-file cap in bytes.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Per-user cap in bytes.
    #[serde(default = "default_max_user_bytes")]
    pub max_user_bytes: u64,
    /// Attempts before an optimistic transaction gives up.
    #[serde(default = "default_transaction_max_attempts")]
    pub transaction_max_attempts: u32,
}

/// Archival sweeper configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Whether the scheduled passes run at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scheduled passes.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Days without access before an active blob is soft-deleted.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Days after soft delete before chunks are purged. Unset disables purging.
    #[serde(default)]
    pub purge_after_days: Option<u32>,
    /// Hours before an unfinished upload is reaped. Unset disables reaping.
    #[serde(default)]
    pub abandoned_upload_ttl_hours: Option<u32>,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Byte limits shared by every service that moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Chunk size in bytes.
    pub chunk_size: usize,
    /// Per-file cap in bytes.
    pub max_file_bytes: u64,
    /// Per-user cap in bytes.
    pub max_user_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_user_bytes: DEFAULT_MAX_USER_BYTES,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

const fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

const fn default_max_user_bytes() -> u64 {
    DEFAULT_MAX_USER_BYTES
}

const fn default_transaction_max_attempts() -> u32 {
    5
}

const fn default_true() -> bool {
    true
}

const fn default_sweep_interval_secs() -> u64 {
    3600
}

const fn default_retention_days() -> u32 {
    45
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_user_bytes: DEFAULT_MAX_USER_BYTES,
            transaction_max_attempts: default_transaction_max_attempts(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_days: default_retention_days(),
            purge_after_days: None,
            abandoned_upload_ttl_hours: None,
        }
    }
}

impl StorageConfig {
    /// Byte limits for the services.
    #[must_use]
    pub const fn limits(&self) -> Limits {
        Limits {
            chunk_size: self.chunk_size,
            max_file_bytes: self.max_file_bytes,
            max_user_bytes: self.max_user_bytes,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `BLOBHUB_ENV`)
    /// 3. Environment variables with `BLOBHUB_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("BLOBHUB_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BLOBHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<Self>()?.validated()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BLOBHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<Self>()?.validated()
    }

    fn validated(self) -> Result<Self, config::ConfigError> {
        if self.storage.chunk_size == 0 {
            return Err(config::ConfigError::Message(
                "storage.chunk_size must be positive".to_string(),
            ));
        }
        if self.storage.max_file_bytes > self.storage.max_user_bytes {
            return Err(config::ConfigError::Message(
                "storage.max_file_bytes cannot exceed storage.max_user_bytes".to_string(),
            ));
        }
        if self.storage.transaction_max_attempts == 0 {
            return Err(config::ConfigError::Message(
                "storage.transaction_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(config::ConfigError::Message(
                "database.url is required for the postgres backend".to_string(),
            ));
        }
        Ok(self)
    }
}
