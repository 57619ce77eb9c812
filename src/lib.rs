//! Eventlog - append-only relational event log
//!
//! Persists event-sourcing messages in a single SQL table and reads them
//! back per aggregate, after a known version, or globally by recording time.

pub mod config;
pub mod message;
pub mod serializer;
pub mod storage;
pub mod utils;

pub use message::{header, Headers, Message};
pub use serializer::{JsonMessageSerializer, MessageSerializer, SerializedMessage};
pub use storage::{
    init_storage, AggregateStream, EventLogStore, MessageStream, Result, StorageError,
};
