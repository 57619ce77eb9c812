//! Shared storage helper functions.
//!
//! Row construction and payload decoding used by every backend, so that
//! id assignment, timestamp normalization and version handling behave the
//! same regardless of where the rows end up.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::message::{header, Message};
use crate::serializer::MessageSerializer;

use super::{Result, StorageError};

/// Format of `time_of_recording` in the table: UTC, no offset.
pub const STORED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Timestamp layouts accepted with an explicit offset.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
];

/// Timestamp layouts accepted without an offset.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Row form of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub event_id: String,
    pub event_type: Option<String>,
    pub aggregate_root_id: Option<String>,
    pub aggregate_root_version: i64,
    pub time_of_recording: String,
    pub payload: String,
}

impl EventRecord {
    /// Serialize a message into a row.
    ///
    /// A missing event id is generated and written into the serialized
    /// headers as well, so the stored payload carries it.
    pub fn from_message(message: &Message, serializer: &dyn MessageSerializer) -> Result<Self> {
        let mut serialized = serializer.serialize_message(message)?;

        let event_id = match serialized.headers.get(header::EVENT_ID).cloned() {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::String(_)) | Some(Value::Null) | None => {
                let id = Uuid::new_v4().to_string();
                serialized
                    .headers
                    .insert(header::EVENT_ID.to_string(), Value::String(id.clone()));
                id
            }
            Some(other) => {
                return Err(StorageError::InvalidMessage(format!(
                    "event id must be a string, got {other}"
                )))
            }
        };

        let event_type = optional_string(serialized.headers.get(header::EVENT_TYPE));
        let aggregate_root_id = optional_string(serialized.headers.get(header::AGGREGATE_ROOT_ID));
        let aggregate_root_version =
            resolve_version(serialized.headers.get(header::AGGREGATE_ROOT_VERSION))?;
        let time_of_recording = match serialized
            .headers
            .get(header::TIME_OF_RECORDING)
            .and_then(Value::as_str)
        {
            Some(raw) => normalize_time_of_recording(raw)?,
            None => Utc::now().format(STORED_TIME_FORMAT).to_string(),
        };

        let payload = serde_json::to_string(&serialized)?;

        Ok(Self {
            event_id,
            event_type,
            aggregate_root_id,
            aggregate_root_version,
            time_of_recording,
            payload,
        })
    }
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Resolve the version column value; absent means 0.
pub fn resolve_version(value: Option<&Value>) -> Result<i64> {
    let value = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(value) => value,
    };
    crate::message::version_from_value(value)
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| StorageError::InvalidVersion(value.to_string()))
}

/// Strip the offset from a recording timestamp.
///
/// Offset-carrying values are converted to UTC first so that every stored
/// value sorts in one zone. Values without an offset are kept as they are.
pub fn normalize_time_of_recording(raw: &str) -> Result<String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc).format(STORED_TIME_FORMAT).to_string());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Ok(dt.with_timezone(&Utc).format(STORED_TIME_FORMAT).to_string());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt.format(STORED_TIME_FORMAT).to_string());
        }
    }

    Err(StorageError::InvalidTimestamp(raw.to_string()))
}

/// Decode one stored payload into the message(s) it holds.
pub fn decode_payload(serializer: &dyn MessageSerializer, payload: &str) -> Result<Vec<Message>> {
    let value: Value = serde_json::from_str(payload)?;
    serializer.unserialize_payload(value)
}
