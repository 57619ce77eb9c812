//! PostgreSQL EventLogStore implementation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use sea_query::{Alias, Expr, Order, PostgresQueryBuilder, Query, SelectStatement};
use sea_query_binder::SqlxBinder;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, warn};

use crate::message::Message;
use crate::serializer::MessageSerializer;
use crate::storage::helpers::{self, EventRecord};
use crate::storage::schema::{self, EventLog, INSERT_COLUMNS};
use crate::storage::{
    AggregateStream, EventLogStore, MessageStream, Result, StorageError, INSERT_CHUNK_SIZE,
};

/// PostgreSQL implementation of EventLogStore.
pub struct PostgresEventLogStore {
    pool: PgPool,
    serializer: Arc<dyn MessageSerializer>,
    table: String,
    unique_aggregate_version: bool,
}

impl PostgresEventLogStore {
    /// Create a new PostgreSQL event log store over `table`.
    pub fn new(pool: PgPool, serializer: Arc<dyn MessageSerializer>, table: &str) -> Self {
        Self {
            pool,
            serializer,
            table: table.to_string(),
            unique_aggregate_version: false,
        }
    }

    /// Make `init` create a unique index on (aggregate root id, version).
    pub fn with_unique_aggregate_version(mut self, unique: bool) -> Self {
        self.unique_aggregate_version = unique;
        self
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        let table = schema::create_table(&self.table).to_string(PostgresQueryBuilder);
        sqlx::query(&table).execute(&self.pool).await?;

        for index in schema::create_indexes(&self.table, self.unique_aggregate_version) {
            sqlx::query(&index.to_string(PostgresQueryBuilder))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn insert_records(
        conn: &mut PgConnection,
        table: &str,
        records: &[EventRecord],
    ) -> Result<()> {
        for chunk in records.chunks(INSERT_CHUNK_SIZE) {
            let mut insert = Query::insert();
            insert.into_table(Alias::new(table)).columns(INSERT_COLUMNS);
            for record in chunk {
                insert.values([
                    record.event_id.clone().into(),
                    record.event_type.clone().into(),
                    record.aggregate_root_id.clone().into(),
                    record.aggregate_root_version.into(),
                    record.time_of_recording.clone().into(),
                    record.payload.clone().into(),
                ])?;
            }

            let (sql, values) = insert.build_sqlx(PostgresQueryBuilder);
            sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        }
        Ok(())
    }

    fn aggregate_query(&self, aggregate_root_id: &str) -> SelectStatement {
        Query::select()
            .column(EventLog::Payload)
            .from(Alias::new(&self.table))
            .and_where(Expr::col(EventLog::AggregateRootId).eq(aggregate_root_id))
            .order_by(EventLog::AggregateRootVersion, Order::Asc)
            .to_owned()
    }

    fn stream_query(&self, query: SelectStatement) -> MessageStream {
        let (sql, values) = query.build_sqlx(PostgresQueryBuilder);
        let pool = self.pool.clone();
        let serializer = Arc::clone(&self.serializer);

        Box::pin(async_stream::try_stream! {
            let mut rows = sqlx::query_with(&sql, values).fetch(&pool);
            while let Some(row) = rows.try_next().await.map_err(StorageError::from)? {
                let payload: String = row.try_get("payload").map_err(StorageError::from)?;
                let messages = helpers::decode_payload(serializer.as_ref(), &payload)
                    .inspect_err(|e| warn!(error = %e, "Failed to decode stored payload"))?;
                for message in messages {
                    yield message;
                }
            }
        })
    }
}

#[async_trait]
impl EventLogStore for PostgresEventLogStore {
    async fn append(&self, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let records = messages
            .iter()
            .map(|message| EventRecord::from_message(message, self.serializer.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        // Dropping an uncommitted transaction rolls it back.
        let mut tx = self.pool.begin().await.map_err(StorageError::transaction)?;

        if let Err(e) = Self::insert_records(&mut tx, &self.table, &records).await {
            warn!(table = %self.table, error = %e, "Append failed, rolling back");
            return Err(e);
        }

        tx.commit().await.map_err(StorageError::transaction)?;
        debug!(table = %self.table, count = records.len(), "Appended messages");
        Ok(())
    }

    fn read_aggregate_stream(&self, aggregate_root_id: &str) -> AggregateStream {
        debug!(table = %self.table, aggregate_root_id, "Reading aggregate stream");
        AggregateStream::new(self.stream_query(self.aggregate_query(aggregate_root_id)))
    }

    fn read_all(&self) -> MessageStream {
        debug!(table = %self.table, "Reading all messages");
        let query = Query::select()
            .column(EventLog::Payload)
            .from(Alias::new(&self.table))
            .order_by(EventLog::TimeOfRecording, Order::Asc)
            .to_owned();
        self.stream_query(query)
    }

    fn read_aggregate_stream_after_version(
        &self,
        aggregate_root_id: &str,
        after_version: u64,
    ) -> AggregateStream {
        debug!(table = %self.table, aggregate_root_id, after_version, "Reading aggregate stream after version");
        let after = i64::try_from(after_version).unwrap_or(i64::MAX);
        let query = self
            .aggregate_query(aggregate_root_id)
            .and_where(Expr::col(EventLog::AggregateRootVersion).gt(after))
            .to_owned();
        AggregateStream::new(self.stream_query(query))
    }
}
