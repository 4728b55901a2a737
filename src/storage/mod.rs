//! Document persistence: one logical table of JSON attribute documents
//! keyed by `(model_name, identifier)` among valid rows.

pub mod config;
pub mod engine;
pub mod memory;
mod store;

pub use config::StoreConfig;
pub use engine::StorageEngine;
pub use memory::MemoryEngine;
pub use store::DocumentStore;

use crate::core::{ModelError, Result};
use crate::query::JsonPredicate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: u64,
    pub identifier: String,
    pub model_name: String,
    /// Serialized attribute view.
    pub attributions: String,
    /// Epoch seconds.
    pub ctime: i64,
    /// Epoch seconds.
    pub utime: i64,
    pub valid: bool,
}

impl StoredDocument {
    pub fn has_attributes(&self) -> bool {
        !self.attributions.trim().is_empty()
    }

    /// Parsed attribute object; `None` for blank attribute text.
    pub fn attributes(&self) -> Result<Option<Map<String, Value>>> {
        if !self.has_attributes() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(&self.attributions) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(other) => Err(ModelError::Storage(format!(
                "row {} of {} holds a non-object document: {}",
                self.id, self.model_name, other
            ))),
            Err(err) => Err(ModelError::Storage(format!(
                "row {} of {} holds malformed JSON: {}",
                self.id, self.model_name, err
            ))),
        }
    }

    /// Document the predicates run against. Blank text reads as JSON null
    /// and malformed text as `None`.
    fn document(&self) -> Option<Value> {
        if !self.has_attributes() {
            return Some(Value::Null);
        }
        serde_json::from_str(&self.attributions).ok()
    }
}

/// Row insert request; `ctime` doubles as the initial `utime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub identifier: String,
    pub model_name: String,
    pub attributions: String,
    pub ctime: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpdate {
    pub attributions: String,
    pub utime: i64,
}

/// Row selection. Only valid rows of one model are ever selected.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    model_name: String,
    identifier: Option<String>,
    predicate: Option<JsonPredicate>,
    limit: Option<usize>,
}

impl RowFilter {
    /// The single row addressed by `(model_name, identifier)`.
    pub fn identity(model_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            identifier: Some(identifier.into()),
            predicate: None,
            limit: Some(1),
        }
    }

    /// Rows whose documents satisfy `predicate`; `None` selects every row.
    pub fn matching(model_name: impl Into<String>, predicate: Option<JsonPredicate>) -> Self {
        Self {
            model_name: model_name.into(),
            identifier: None,
            predicate,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn predicate(&self) -> Option<&JsonPredicate> {
        self.predicate.as_ref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn matches(&self, row: &StoredDocument) -> bool {
        if !row.valid || row.model_name != self.model_name {
            return false;
        }
        if let Some(identifier) = &self.identifier {
            if row.identifier != *identifier {
                return false;
            }
        }
        match &self.predicate {
            None => true,
            Some(predicate) => row
                .document()
                .is_some_and(|document| predicate.matches(&document)),
        }
    }
}
