//! Messages: an event body plus metadata headers.
//!
//! The store treats the event body as opaque JSON. Headers carry the
//! metadata the log indexes on (id, type, aggregate root, version, time).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header map carried by every message.
pub type Headers = Map<String, Value>;

/// Well-known header names.
pub mod header {
    /// Globally unique event identifier.
    pub const EVENT_ID: &str = "__event_id";
    /// Logical event kind.
    pub const EVENT_TYPE: &str = "__event_type";
    /// Owning aggregate stream.
    pub const AGGREGATE_ROOT_ID: &str = "__aggregate_root_id";
    /// Position of the event within its aggregate stream.
    pub const AGGREGATE_ROOT_VERSION: &str = "__aggregate_root_version";
    /// When the event was recorded.
    pub const TIME_OF_RECORDING: &str = "__time_of_recording";
}

/// A domain event together with its headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    headers: Headers,
    event: Value,
}

impl Message {
    /// Create a message with no headers.
    pub fn new(event: Value) -> Self {
        Self {
            headers: Headers::new(),
            event,
        }
    }

    /// Create a message with the given headers.
    pub fn with_headers(event: Value, headers: Headers) -> Self {
        Self { headers, event }
    }

    /// Return a copy of this message with one header set.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, key: &str) -> Option<&Value> {
        self.headers.get(key)
    }

    pub fn event(&self) -> &Value {
        &self.event
    }

    pub fn into_parts(self) -> (Headers, Value) {
        (self.headers, self.event)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.str_header(header::EVENT_ID)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.str_header(header::EVENT_TYPE)
    }

    pub fn aggregate_root_id(&self) -> Option<&str> {
        self.str_header(header::AGGREGATE_ROOT_ID)
    }

    /// Aggregate root version, if present and non-negative.
    ///
    /// Accepts a JSON number or a numeric string.
    pub fn aggregate_root_version(&self) -> Option<u64> {
        version_from_value(self.header(header::AGGREGATE_ROOT_VERSION)?)
    }

    pub fn time_of_recording(&self) -> Option<&str> {
        self.str_header(header::TIME_OF_RECORDING)
    }

    fn str_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(Value::as_str)
    }
}

/// Parse a version header value.
pub(crate) fn version_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
