//! Storage implementations.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::{StorageConfig, StorageType};
use crate::serializer::MessageSerializer;

mod error;
mod event_log_store;
pub mod helpers;
pub mod schema;
mod stream;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::{Result, StorageError};
pub use event_log_store::EventLogStore;
pub use helpers::EventRecord;
pub use stream::{AggregateStream, MessageStream};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEventLogStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresEventLogStore;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockEventLogStore;

/// Rows per INSERT statement; keeps a batch under the bind-parameter limit.
pub(crate) const INSERT_CHUNK_SIZE: usize = 500;

/// Initialize storage based on configuration.
///
/// Opens the configured pool, creates the table if needed and returns the
/// matching store. Callers that already hold a pool should construct the
/// store directly instead.
pub async fn init_storage(
    config: &StorageConfig,
    serializer: Arc<dyn MessageSerializer>,
) -> std::result::Result<Arc<dyn EventLogStore>, Box<dyn std::error::Error + Send + Sync>> {
    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!(path = %config.sqlite.path, table = %config.table_name, "Storage: sqlite");

            if let Some(parent) = std::path::Path::new(&config.sqlite.path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let pool =
                sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.sqlite.path))
                    .await?;

            let store = SqliteEventLogStore::new(pool, serializer, &config.table_name)
                .with_unique_aggregate_version(config.unique_aggregate_version);
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        StorageType::Postgres => {
            info!(table = %config.table_name, "Storage: postgres");

            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.postgres.max_connections)
                .connect(&config.postgres.uri)
                .await?;

            let store = PostgresEventLogStore::new(pool, serializer, &config.table_name)
                .with_unique_aggregate_version(config.unique_aggregate_version);
            store.init().await?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => {
            error!(storage_type = ?other, "Storage backend not enabled in this build");
            Err(format!("Storage backend not enabled: {:?}", other).into())
        }
    }
}
