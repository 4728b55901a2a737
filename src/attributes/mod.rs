//! Uniform key/value view over a model instance's tagged state.

use crate::core::{ModelError, Result};
use crate::schema::{describe, Instance, Model, TypeMetadata};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Mutable mapping view over one instance.
///
/// Reads consult fields first and then getters; writes consult fields
/// first and then setters. The view never owns the state it exposes.
pub struct AttributeView<'a> {
    target: &'a mut Instance,
    meta: Arc<TypeMetadata>,
}

impl<'a> AttributeView<'a> {
    pub fn new(target: &'a mut Instance, meta: Arc<TypeMetadata>) -> Self {
        Self { target, meta }
    }

    /// Builds a view over a typed model, describing its type if needed.
    pub fn of<M: Model>(model: &'a mut M) -> Result<Self> {
        let meta = describe::<M>()?;
        Ok(Self::new(model as &mut Instance, meta))
    }

    pub fn metadata(&self) -> &Arc<TypeMetadata> {
        &self.meta
    }

    pub fn model_name(&self) -> &str {
        self.meta.model_name()
    }

    /// Current value of `name`, or `None` if no field or getter exposes it.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        if let Some(slot) = self.meta.field(name) {
            return (slot.get)(&*self.target).map(Some);
        }
        if let Some(read) = self.meta.getter(name) {
            return read(&*self.target).map(Some);
        }
        Ok(None)
    }

    /// Writes `value` and returns the previous value.
    ///
    /// A name with no field and no setter is skipped and yields `None`,
    /// as does a setter-only attribute (its previous value is unreadable).
    pub fn set(&mut self, name: &str, value: Value) -> Result<Option<Value>> {
        if let Some(slot) = self.meta.field(name) {
            let previous = (slot.get)(&*self.target)?;
            (slot.set)(&mut *self.target, value)?;
            return Ok(Some(previous));
        }

        if let Some(write) = self.meta.setter(name) {
            let previous = match self.meta.getter(name) {
                Some(read) => Some(read(&*self.target)?),
                None => None,
            };
            write(&mut *self.target, value)?;
            return Ok(previous);
        }

        trace!(
            model = self.meta.model_name(),
            attribute = name,
            "skipping write to read-only or unknown attribute"
        );
        Ok(None)
    }

    /// Applies `set` to every entry. Unknown names are skipped.
    pub fn put_all<I, K>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (name, value) in entries {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Field and getter names, sorted and deduplicated.
    pub fn keys(&self) -> BTreeSet<String> {
        self.meta.attribute_names()
    }

    /// True when `name` is a field or a getter.
    pub fn contains_key(&self, name: &str) -> bool {
        self.meta.field(name).is_some() || self.meta.getter(name).is_some()
    }

    /// Field count plus getter count; a name backed by both counts twice.
    pub fn len(&self) -> usize {
        self.meta.field_names().len() + self.meta.getter_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every readable attribute.
    pub fn to_json_map(&self) -> Result<Map<String, Value>> {
        read_all(&self.meta, &*self.target)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json_map()?)?)
    }

    pub fn remove(&mut self, name: &str) -> Result<Option<Value>> {
        Err(ModelError::UnsupportedOperation(format!(
            "remove '{}' from attribute view",
            name
        )))
    }

    pub fn contains_value(&self, _value: &Value) -> Result<bool> {
        Err(ModelError::UnsupportedOperation(
            "contains_value on attribute view".to_string(),
        ))
    }

    pub fn clear(&mut self) -> Result<()> {
        Err(ModelError::UnsupportedOperation(
            "clear attribute view".to_string(),
        ))
    }
}

/// Reads fields, then getters for names no field covers.
pub(crate) fn read_all(meta: &TypeMetadata, target: &Instance) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for (name, slot) in meta.fields() {
        map.insert(name.clone(), (slot.get)(target)?);
    }
    for (name, read) in meta.getters() {
        if !map.contains_key(name) {
            map.insert(name.clone(), read(target)?);
        }
    }
    Ok(map)
}

impl fmt::Debug for AttributeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeView")
            .field("model", &self.meta.model_name())
            .field("keys", &self.keys())
            .finish()
    }
}
