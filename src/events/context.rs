use crate::core::{ModelError, Result};
use crate::storage::DocumentStore;
use std::fmt;

/// Collaborators an asynchronous handler can reach while it runs.
///
/// Registry-produced handles carry the registry's store here, so a
/// handler can persist or reload its own model.
#[derive(Clone, Default)]
pub struct EventContext {
    model_name: String,
    store: Option<DocumentStore>,
}

impl EventContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: DocumentStore) -> Self {
        Self {
            model_name: String::new(),
            store: Some(store),
        }
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// The attached store, or [`ModelError::StoreUnavailable`].
    pub fn store(&self) -> Result<&DocumentStore> {
        self.store
            .as_ref()
            .ok_or_else(|| ModelError::StoreUnavailable(self.model_name.clone()))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub(crate) fn for_model(mut self, model_name: &str) -> Self {
        if self.model_name.is_empty() {
            self.model_name = model_name.to_string();
        }
        self
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("model_name", &self.model_name)
            .field("has_store", &self.has_store())
            .finish()
    }
}
