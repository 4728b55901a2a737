use super::builder::SchemaBuilder;
use super::metadata::TypeMetadata;
use super::Model;
use crate::core::SchemaError;
use lazy_static::lazy_static;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, error};

type Description = Result<Arc<TypeMetadata>, SchemaError>;

lazy_static! {
    // One cell per type: the map lock is held only to fetch the cell, so
    // describing unrelated types never waits on each other.
    static ref DESCRIPTIONS: Mutex<HashMap<TypeId, Arc<OnceLock<Description>>>> =
        Mutex::new(HashMap::new());
}

/// Returns the cached description of `M`, building it on first use.
///
/// Concurrent first calls for the same type block until a single build
/// finishes and all observe the same `Arc`. A failed build is cached too.
pub fn describe<M: Model>() -> Result<Arc<TypeMetadata>, SchemaError> {
    let cell = {
        let mut cells = DESCRIPTIONS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cells
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Arc::new(OnceLock::new()))
            .clone()
    };

    cell.get_or_init(build::<M>).clone()
}

fn build<M: Model>() -> Description {
    let mut builder = SchemaBuilder::<M>::new();
    M::declare(&mut builder);

    match builder.finish() {
        Ok(metadata) => {
            debug!(
                model = M::NAME,
                fields = metadata.field_names().len(),
                getters = metadata.getter_names().len(),
                setters = metadata.setter_names().len(),
                events = metadata.event_names().len(),
                "described model type"
            );
            Ok(Arc::new(metadata))
        }
        Err(err) => {
            error!(model = M::NAME, error = %err, "model type description failed");
            Err(err)
        }
    }
}
