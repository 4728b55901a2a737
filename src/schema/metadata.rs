use super::builder::{
    Declaration, ErasedGet, ErasedIdentifier, ErasedInit, ErasedSet, FieldSlot, Instance,
    MethodBody,
};
use super::naming::{event_name, field_name, getter_name, setter_name};
use crate::core::{SchemaError, ValueKind};
use crate::events::EventHandler;
use crate::query::JsonPath;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Classified description of one model type.
///
/// Built once per type and shared read-only afterwards. Fields and getters
/// may share a lookup name; within each kind names are unique.
pub struct TypeMetadata {
    model_name: String,
    fields: HashMap<String, FieldSlot>,
    getters: HashMap<String, ErasedGet>,
    setters: HashMap<String, ErasedSet>,
    events: HashMap<String, EventHandler>,
    identifier: Option<ErasedIdentifier>,
    init: ErasedInit,
}

impl TypeMetadata {
    pub(crate) fn classify(
        model_name: &str,
        declarations: Vec<Declaration>,
        identifier: Option<ErasedIdentifier>,
        init: ErasedInit,
    ) -> Result<Self, SchemaError> {
        let mut metadata = Self {
            model_name: model_name.to_string(),
            fields: HashMap::new(),
            getters: HashMap::new(),
            setters: HashMap::new(),
            events: HashMap::new(),
            identifier,
            init,
        };

        for declaration in declarations {
            match declaration {
                Declaration::Field { tag, slot } => {
                    let name = field_name(&tag);
                    metadata.ensure_attribute_named(&name, tag.member())?;
                    if metadata.fields.insert(name.clone(), slot).is_some() {
                        return Err(metadata.duplicate_attribute(name));
                    }
                }
                Declaration::Method {
                    tag,
                    body: MethodBody::Getter(read),
                } => {
                    let name = getter_name(&tag);
                    metadata.ensure_attribute_named(&name, tag.member())?;
                    if metadata.getters.insert(name.clone(), read).is_some() {
                        return Err(metadata.duplicate_attribute(name));
                    }
                }
                Declaration::Method {
                    tag,
                    body: MethodBody::Setter(write),
                } => {
                    let name = setter_name(&tag);
                    metadata.ensure_attribute_named(&name, tag.member())?;
                    if metadata.setters.insert(name.clone(), write).is_some() {
                        return Err(metadata.duplicate_attribute(name));
                    }
                }
                Declaration::Event { tag, handler } => {
                    let name = event_name(&tag);
                    metadata.ensure_named(&name, tag.member())?;
                    if metadata.events.insert(name.clone(), handler).is_some() {
                        return Err(SchemaError::DuplicateEvent {
                            model: metadata.model_name.clone(),
                            name,
                        });
                    }
                }
            }
        }

        Ok(metadata)
    }

    fn ensure_named(&self, name: &str, member: &str) -> Result<(), SchemaError> {
        if name.trim().is_empty() {
            return Err(SchemaError::InvalidDeclaration {
                model: self.model_name.clone(),
                reason: format!("member '{}' resolves to an empty name", member),
            });
        }
        Ok(())
    }

    /// Attribute names also key the stored document, so each one must be
    /// a single addressable path segment.
    fn ensure_attribute_named(&self, name: &str, member: &str) -> Result<(), SchemaError> {
        self.ensure_named(name, member)?;
        if !JsonPath::accepts_segment(name) {
            return Err(SchemaError::InvalidDeclaration {
                model: self.model_name.clone(),
                reason: format!(
                    "attribute '{}' of member '{}' cannot be used as a document key",
                    name, member
                ),
            });
        }
        Ok(())
    }

    fn duplicate_attribute(&self, name: String) -> SchemaError {
        SchemaError::DuplicateAttribute {
            model: self.model_name.clone(),
            name,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Union of field and getter names, sorted.
    pub fn attribute_names(&self) -> BTreeSet<String> {
        self.fields
            .keys()
            .chain(self.getters.keys())
            .cloned()
            .collect()
    }

    pub fn field_names(&self) -> BTreeSet<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn getter_names(&self) -> BTreeSet<String> {
        self.getters.keys().cloned().collect()
    }

    pub fn setter_names(&self) -> BTreeSet<String> {
        self.setters.keys().cloned().collect()
    }

    pub fn event_names(&self) -> BTreeSet<String> {
        self.events.keys().cloned().collect()
    }

    pub fn field_kind(&self, name: &str) -> Option<ValueKind> {
        self.fields.get(name).map(|slot| slot.kind)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn is_storable(&self) -> bool {
        self.identifier.is_some()
    }

    pub(crate) fn field(&self, name: &str) -> Option<&FieldSlot> {
        self.fields.get(name)
    }

    pub(crate) fn getter(&self, name: &str) -> Option<&ErasedGet> {
        self.getters.get(name)
    }

    pub(crate) fn setter(&self, name: &str) -> Option<&ErasedSet> {
        self.setters.get(name)
    }

    pub(crate) fn fields(&self) -> impl Iterator<Item = (&String, &FieldSlot)> {
        self.fields.iter()
    }

    pub(crate) fn getters(&self) -> impl Iterator<Item = (&String, &ErasedGet)> {
        self.getters.iter()
    }

    pub(crate) fn events(&self) -> impl Iterator<Item = (&String, &EventHandler)> {
        self.events.iter()
    }

    pub(crate) fn identifier_of(&self, target: &Instance) -> Option<String> {
        self.identifier.as_ref().and_then(|identify| identify(target))
    }

    pub(crate) fn initialize(&self, target: &mut Instance) {
        (self.init)(target)
    }
}

impl fmt::Debug for TypeMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("model_name", &self.model_name)
            .field("fields", &self.field_names())
            .field("getters", &self.getter_names())
            .field("setters", &self.setter_names())
            .field("events", &self.event_names())
            .field("storable", &self.is_storable())
            .finish()
    }
}
