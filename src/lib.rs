// ============================================================================
// docmodel Library
// ============================================================================

//! Declarative model runtime.
//!
//! Model types declare their attributes and events once through
//! [`Model::declare`]; the runtime caches that description per type and
//! builds on it:
//!
//! - [`AttributeView`]: a key/value view over an instance's tagged state,
//! - [`EventDispatcher`]: named events with typed parameter binding,
//! - [`ModelRegistry`]: name to factory map that constructs, hydrates and
//!   initializes instances,
//! - [`DocumentStore`]: JSON attribute documents in one logical table,
//!   queried with an AND/OR [`Condition`] tree.

pub mod attributes;
pub mod core;
pub mod events;
pub mod prelude;
pub mod query;
pub mod registry;
pub mod result;
pub mod schema;
pub mod storage;

// Re-export main types for convenience
pub use attributes::AttributeView;
pub use crate::core::{AttributeValue, ModelError, Result, SchemaError, ValueKind};
pub use events::{
    BoundArgs, BoundValue, EventContext, EventDispatcher, EventHandler, EventPayload, Param,
    ParamType, PayloadValue, StreamPart,
};
pub use query::{Condition, JsonPredicate};
pub use registry::{EventResponse, ModelFactory, ModelHandle, ModelInstance, ModelRegistry};
pub use result::CommonResult;
pub use schema::{describe, Instance, Model, SchemaBuilder, Storable, Tag, TypeMetadata};
pub use storage::{
    DocumentStore, MemoryEngine, RowFilter, StorageEngine, StoreConfig, StoredDocument,
};
