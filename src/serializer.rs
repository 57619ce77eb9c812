//! Message serialization.
//!
//! The store persists whatever `MessageSerializer::serialize_message`
//! produces and hands stored payloads back to
//! `MessageSerializer::unserialize_payload` on read. The format itself is
//! the serializer's business.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Headers, Message};
use crate::storage::{Result, StorageError};

/// Serialized form of a message: headers plus an encoded body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedMessage {
    pub headers: Headers,
    pub payload: Value,
}

/// Converts messages to and from their stored representation.
pub trait MessageSerializer: Send + Sync {
    /// Encode a message for storage.
    fn serialize_message(&self, message: &Message) -> Result<SerializedMessage>;

    /// Decode a stored payload. One payload may hold several messages.
    fn unserialize_payload(&self, payload: Value) -> Result<Vec<Message>>;
}

/// Stores the message body as-is next to its headers.
///
/// A payload is either a single `{"headers": .., "payload": ..}` object or
/// an array of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMessageSerializer;

impl JsonMessageSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl MessageSerializer for JsonMessageSerializer {
    fn serialize_message(&self, message: &Message) -> Result<SerializedMessage> {
        Ok(SerializedMessage {
            headers: message.headers().clone(),
            payload: message.event().clone(),
        })
    }

    fn unserialize_payload(&self, payload: Value) -> Result<Vec<Message>> {
        match payload {
            Value::Array(items) => items.into_iter().map(decode_one).collect(),
            other => Ok(vec![decode_one(other)?]),
        }
    }
}

fn decode_one(value: Value) -> Result<Message> {
    let serialized: SerializedMessage = serde_json::from_value(value)
        .map_err(|e| StorageError::InvalidMessage(format!("malformed payload: {e}")))?;
    Ok(Message::with_headers(serialized.payload, serialized.headers))
}
