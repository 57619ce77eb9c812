//! Mock storage implementation for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;

use crate::message::Message;
use crate::serializer::{JsonMessageSerializer, MessageSerializer};
use crate::storage::helpers::{self, EventRecord};
use crate::storage::{AggregateStream, EventLogStore, MessageStream, Result, StorageError};

/// Mock event log that keeps rows in memory.
///
/// Rows go through the same serialization and normalization as the SQL
/// backends, and reads decode them lazily in the same orders.
pub struct MockEventLogStore {
    records: Arc<RwLock<Vec<EventRecord>>>,
    serializer: Arc<dyn MessageSerializer>,
    fail_on_append: RwLock<bool>,
    transactions: AtomicUsize,
}

impl Default for MockEventLogStore {
    fn default() -> Self {
        Self::with_serializer(Arc::new(JsonMessageSerializer))
    }
}

impl MockEventLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serializer(serializer: Arc<dyn MessageSerializer>) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            serializer,
            fail_on_append: RwLock::new(false),
            transactions: AtomicUsize::new(0),
        }
    }

    pub async fn set_fail_on_append(&self, fail: bool) {
        *self.fail_on_append.write().await = fail;
    }

    /// Number of append transactions started so far.
    pub fn transactions_started(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    pub async fn stored_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Insert a raw row, bypassing serialization.
    pub async fn insert_raw(&self, record: EventRecord) {
        self.records.write().await.push(record);
    }

    /// Snapshot matching rows in the requested order, decode lazily.
    fn stream_records<F, K>(&self, filter: F, sort_key: K) -> MessageStream
    where
        F: Fn(&EventRecord) -> bool + Send + 'static,
        K: Fn(&EventRecord) -> (i64, String) + Send + 'static,
    {
        let records = Arc::clone(&self.records);
        let serializer = Arc::clone(&self.serializer);

        stream::once(async move {
            let mut rows: Vec<EventRecord> = records
                .read()
                .await
                .iter()
                .filter(|record| filter(record))
                .cloned()
                .collect();
            rows.sort_by_key(|r| sort_key(r));
            stream::iter(rows)
        })
        .flatten()
        .flat_map(move |row| {
            let decoded = helpers::decode_payload(serializer.as_ref(), &row.payload);
            let items: Vec<Result<Message>> = match decoded {
                Ok(messages) => messages.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
        .boxed()
    }

    fn aggregate_stream(&self, aggregate_root_id: &str, after: Option<i64>) -> AggregateStream {
        let id = aggregate_root_id.to_string();
        let filter = move |r: &EventRecord| {
            r.aggregate_root_id.as_deref() == Some(id.as_str())
                && after.map_or(true, |a| r.aggregate_root_version > a)
        };
        AggregateStream::new(self.stream_records(filter, |r| {
            (r.aggregate_root_version, String::new())
        }))
    }
}

#[async_trait]
impl EventLogStore for MockEventLogStore {
    async fn append(&self, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        self.transactions.fetch_add(1, Ordering::SeqCst);

        if *self.fail_on_append.read().await {
            return Err(StorageError::Connection(sqlx::Error::PoolClosed));
        }

        let records = messages
            .iter()
            .map(|message| EventRecord::from_message(message, self.serializer.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut store = self.records.write().await;
        let mut seen: HashSet<&str> = store.iter().map(|r| r.event_id.as_str()).collect();
        for record in &records {
            if !seen.insert(record.event_id.as_str()) {
                return Err(StorageError::ConstraintViolation(format!(
                    "duplicate event_id {}",
                    record.event_id
                )));
            }
        }
        drop(seen);
        store.extend(records);
        Ok(())
    }

    fn read_aggregate_stream(&self, aggregate_root_id: &str) -> AggregateStream {
        self.aggregate_stream(aggregate_root_id, None)
    }

    fn read_all(&self) -> MessageStream {
        self.stream_records(|_| true, |r| (0, r.time_of_recording.clone()))
    }

    fn read_aggregate_stream_after_version(
        &self,
        aggregate_root_id: &str,
        after_version: u64,
    ) -> AggregateStream {
        let after = i64::try_from(after_version).unwrap_or(i64::MAX);
        self.aggregate_stream(aggregate_root_id, Some(after))
    }
}
