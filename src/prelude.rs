//! Everything a model definition and its callers usually need.

pub use crate::attributes::AttributeView;
pub use crate::core::{ModelError, Result};
pub use crate::events::{BoundArgs, EventContext, EventPayload, Param, PayloadValue, StreamPart};
pub use crate::query::Condition;
pub use crate::registry::{EventResponse, ModelFactory, ModelHandle, ModelRegistry};
pub use crate::result::CommonResult;
pub use crate::schema::{describe, Model, SchemaBuilder, Storable, Tag};
pub use crate::storage::{DocumentStore, StoreConfig};
