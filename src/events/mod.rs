//! Named events: payloads, parameter binding and the per-instance
//! dispatch table.

mod binding;
mod context;
mod dispatcher;

pub use binding::{BoundArgs, BoundValue, Param, ParamType};
pub use context::EventContext;
pub use dispatcher::{EventDispatcher, EventHandler, HandlerFuture};

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Binary value uploaded alongside an event, e.g. one multipart section.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamPart {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Arc<[u8]>,
}

impl StreamPart {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            file_name: None,
            content_type: None,
            data: Arc::from(data),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// A fresh reader over the part's bytes; each call starts at offset zero.
    pub fn reader(&self) -> Cursor<Arc<[u8]>> {
        Cursor::new(self.data.clone())
    }

    /// Decodes the bytes as UTF-8 text.
    pub fn read_to_string(&self) -> std::result::Result<String, std::str::Utf8Error> {
        std::str::from_utf8(&self.data).map(str::to_string)
    }
}

impl fmt::Debug for StreamPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPart")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// One raw payload value.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Json(Value),
    Stream(StreamPart),
}

impl PayloadValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Json(Value::Null))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Stream(_) => None,
        }
    }

    pub fn as_stream(&self) -> Option<&StreamPart> {
        match self {
            Self::Stream(part) => Some(part),
            Self::Json(_) => None,
        }
    }
}

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<StreamPart> for PayloadValue {
    fn from(part: StreamPart) -> Self {
        Self::Stream(part)
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        Self::Json(Value::String(value.to_string()))
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        Self::Json(Value::String(value))
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        Self::Json(Value::Bool(value))
    }
}

/// Named parameter bag handed to a dispatch call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPayload {
    name: String,
    values: HashMap<String, PayloadValue>,
}

impl EventPayload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    /// Builds a payload from `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PayloadValue>,
    {
        let mut payload = Self::new(name);
        for (key, value) in pairs {
            payload.insert(key, value);
        }
        payload
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PayloadValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON string value of `key`, if it is one.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(PayloadValue::as_json)
            .and_then(Value::as_str)
    }

    /// Integer value of `key` under the same rules as a `long` parameter:
    /// JSON integers, numeric strings and numeric stream text all read.
    pub fn get_long(&self, key: &str) -> Option<i64> {
        let raw = self.get(key)?;
        binding::to_integer(key, raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;

    #[test]
    fn test_stream_reader_restarts() {
        let part = StreamPart::new(b"hello".to_vec()).with_file_name("a.txt");
        let mut first = String::new();
        part.reader().read_to_string(&mut first).unwrap();
        let mut second = String::new();
        part.reader().read_to_string(&mut second).unwrap();

        assert_eq!(first, "hello");
        assert_eq!(second, "hello");
        assert_eq!(part.file_name(), Some("a.txt"));
    }

    #[test]
    fn test_payload_accessors() {
        let payload = EventPayload::new("upload")
            .with("path", "/tmp")
            .with("size", 12_i64)
            .with("meta", json!({"a": 1}));

        assert_eq!(payload.name(), "upload");
        assert_eq!(payload.get_text("path"), Some("/tmp"));
        assert_eq!(payload.get_long("size"), Some(12));
        assert_eq!(payload.get_text("size"), None);
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn test_long_reads_numeric_text() {
        let payload = EventPayload::new("resize")
            .with("width", "42")
            .with("height", " 7 ")
            .with("label", "abc")
            .with("depth", StreamPart::new(b"12".to_vec()))
            .with("ratio", json!(1.5));

        assert_eq!(payload.get_long("width"), Some(42));
        assert_eq!(payload.get_long("height"), Some(7));
        assert_eq!(payload.get_long("label"), None);
        assert_eq!(payload.get_long("depth"), Some(12));
        assert_eq!(payload.get_long("ratio"), None);
        assert_eq!(payload.get_long("missing"), None);
    }

    #[test]
    fn test_null_payload_value() {
        let payload = EventPayload::new("e").with("x", Value::Null);
        assert!(payload.get("x").unwrap().is_null());
    }
}
