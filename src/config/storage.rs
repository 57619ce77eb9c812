//! Storage configuration types.

use serde::Deserialize;

use crate::storage::schema::DEFAULT_TABLE_NAME;

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Sqlite,
    Postgres,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Name of the event log table.
    pub table_name: String,
    /// Create a unique index on (aggregate_root_id, aggregate_root_version).
    pub unique_aggregate_version: bool,
    /// SQLite-specific configuration.
    pub sqlite: SqliteConfig,
    /// PostgreSQL-specific configuration.
    pub postgres: PostgresConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            unique_aggregate_version: false,
            sqlite: SqliteConfig::default(),
            postgres: PostgresConfig::default(),
        }
    }
}

/// SQLite-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file; created along with its parent directory if missing.
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "./data/events.db".to_string(),
        }
    }
}

/// PostgreSQL-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// PostgreSQL connection URI.
    pub uri: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            uri: "postgres://localhost:5432/eventlog".to_string(),
            max_connections: 5,
        }
    }
}
