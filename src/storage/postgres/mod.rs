//! PostgreSQL implementations of storage interfaces.

mod event_log_store;

pub use event_log_store::PostgresEventLogStore;
