//! Database schema definitions using sea-query.
//!
//! The table name is configurable, so the table is addressed through an
//! `Alias` and only the columns are fixed identifiers.

use sea_query::{Alias, ColumnDef, Iden, Index, IndexCreateStatement, Table, TableCreateStatement};

/// Default table name.
pub const DEFAULT_TABLE_NAME: &str = "domain_messages";

/// Event log columns.
#[derive(Iden, Clone, Copy)]
pub enum EventLog {
    #[iden = "event_id"]
    EventId,
    #[iden = "event_type"]
    EventType,
    #[iden = "aggregate_root_id"]
    AggregateRootId,
    #[iden = "aggregate_root_version"]
    AggregateRootVersion,
    #[iden = "time_of_recording"]
    TimeOfRecording,
    #[iden = "payload"]
    Payload,
}

/// Column order used by inserts.
pub const INSERT_COLUMNS: [EventLog; 6] = [
    EventLog::EventId,
    EventLog::EventType,
    EventLog::AggregateRootId,
    EventLog::AggregateRootVersion,
    EventLog::TimeOfRecording,
    EventLog::Payload,
];

/// `CREATE TABLE IF NOT EXISTS` for the event log.
pub fn create_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(
            ColumnDef::new(EventLog::EventId)
                .string()
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(EventLog::EventType).string().null())
        .col(ColumnDef::new(EventLog::AggregateRootId).string().null())
        .col(
            ColumnDef::new(EventLog::AggregateRootVersion)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(ColumnDef::new(EventLog::TimeOfRecording).string().not_null())
        .col(ColumnDef::new(EventLog::Payload).text().not_null())
        .to_owned()
}

/// Indexes backing the per-aggregate and global read orderings.
///
/// With `unique_aggregate_version` the aggregate index rejects two records
/// claiming the same version of one aggregate.
pub fn create_indexes(table: &str, unique_aggregate_version: bool) -> Vec<IndexCreateStatement> {
    let mut aggregate = Index::create()
        .if_not_exists()
        .name(format!("idx_{table}_aggregate"))
        .table(Alias::new(table))
        .col(EventLog::AggregateRootId)
        .col(EventLog::AggregateRootVersion)
        .to_owned();
    if unique_aggregate_version {
        aggregate.unique();
    }

    let recorded = Index::create()
        .if_not_exists()
        .name(format!("idx_{table}_time_of_recording"))
        .table(Alias::new(table))
        .col(EventLog::TimeOfRecording)
        .to_owned();

    vec![aggregate, recorded]
}
