//! EventLogStore trait definition.

use async_trait::async_trait;

use super::stream::{AggregateStream, MessageStream};
use super::Result;
use crate::message::Message;

/// Interface for the append-only event log.
///
/// The log holds immutable messages. Writes are whole batches; reads are
/// lazy streams in an explicit order, never physical insertion order.
///
/// Implementations:
/// - `SqliteEventLogStore`: SQLite storage
/// - `PostgresEventLogStore`: PostgreSQL storage
/// - `MockEventLogStore`: In-memory mock for testing
#[async_trait]
pub trait EventLogStore: Send + Sync {
    /// Persist messages atomically.
    ///
    /// Either every message becomes visible or none does. An empty batch
    /// returns immediately without touching the backing store. Messages
    /// without an event id get a fresh UUID.
    async fn append(&self, messages: Vec<Message>) -> Result<()>;

    /// Replay one aggregate, ascending by `aggregate_root_version`.
    fn read_aggregate_stream(&self, aggregate_root_id: &str) -> AggregateStream;

    /// Replay the whole log, ascending by `time_of_recording`.
    fn read_all(&self) -> MessageStream;

    /// Replay one aggregate from the first version after `after_version`.
    fn read_aggregate_stream_after_version(
        &self,
        aggregate_root_id: &str,
        after_version: u64,
    ) -> AggregateStream;
}
