//! Configuration management for the stock ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with SL_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Which store backs the ledger
    pub storage: StorageConfig,

    /// Ledger tuning
    pub ledger: LedgerConfig,

    /// Logging output
    pub logging: LoggingConfig,

    /// Activity log side channel
    pub audit: AuditConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Upper bound for any statement inside a ledger transaction
    pub statement_timeout_ms: u64,

    /// Apply migrations at start-up even outside development
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Quantity proposed on new reorder suggestions
    pub default_reorder_quantity: i64,

    /// Default page size for listings
    pub page_size: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_reorder_quantity: shared::DEFAULT_REORDER_QUANTITY,
            page_size: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is not set
    pub filter: String,

    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    Database,
    Log,
    Off,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SL_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "postgres://localhost/stock_ledger")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.statement_timeout_ms", 5000)?
            .set_default("database.run_migrations", false)?
            .set_default("storage.backend", "postgres")?
            .set_default("ledger.default_reorder_quantity", shared::DEFAULT_REORDER_QUANTITY)?
            .set_default("ledger.page_size", 20)?
            .set_default("logging.filter", "sl_server=debug,stock_ledger=debug,tower_http=debug,sqlx=warn")?
            .set_default("logging.format", "pretty")?
            .set_default("audit.sink", "database")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SL_ prefix)
            .add_source(
                Environment::with_prefix("SL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Config {
    /// Self-contained configuration on the in-memory store
    pub fn in_memory() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig {
                port: 3000,
                host: "127.0.0.1".to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_secs: 30,
                statement_timeout_ms: 5000,
                run_migrations: false,
            },
            storage: StorageConfig { backend: StorageBackend::Memory },
            ledger: LedgerConfig::default(),
            logging: LoggingConfig {
                filter: "stock_ledger=debug".to_string(),
                format: LogFormat::Pretty,
            },
            audit: AuditConfig { sink: AuditSinkKind::Log },
        }
    }
}
