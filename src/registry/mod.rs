//! Model Registry: model name to construction recipe, plus the
//! construct, hydrate, initialize sequence.

mod factory;
mod instance;

pub use factory::ModelFactory;
pub use instance::{EventResponse, ModelHandle, ModelInstance};

use crate::core::{ModelError, Result};
use crate::events::EventContext;
use crate::query::Condition;
use crate::schema::Model;
use crate::storage::{DocumentStore, StoredDocument};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Name to factory map with optional document store for hydration.
///
/// Handles it produces carry the store in their [`EventContext`], so
/// asynchronous handlers can persist through it.
#[derive(Default)]
pub struct ModelRegistry {
    factories: HashMap<String, Arc<ModelFactory>>,
    store: Option<DocumentStore>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: DocumentStore) -> Self {
        Self {
            factories: HashMap::new(),
            store: Some(store),
        }
    }

    pub fn set_store(&mut self, store: DocumentStore) {
        self.store = Some(store);
    }

    pub fn store(&self) -> Option<&DocumentStore> {
        self.store.as_ref()
    }

    /// Binds `name` to `factory`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, factory: ModelFactory) {
        let name = name.into();
        info!(
            name = %name,
            model = factory.model_name(),
            singleton = factory.is_singleton(),
            "registering model"
        );
        self.factories.insert(name, Arc::new(factory));
    }

    /// Registers `M` under its own name with a per-call default recipe.
    pub fn register_model<M: Model + Default>(&mut self) {
        self.register(M::NAME, ModelFactory::per_call_default::<M>());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// A fresh (or the shared) initialized instance; `None` when `name` is
    /// not registered.
    pub fn get(&self, name: &str) -> Result<Option<ModelHandle>> {
        let Some(factory) = self.factories.get(name) else {
            debug!(name, "model not registered");
            return Ok(None);
        };
        let mut handle = factory.produce(self.context())?;
        handle.initialize();
        Ok(Some(handle))
    }

    /// An instance hydrated from the store when `identifier` is not blank.
    ///
    /// Unlike [`get`](Self::get), an unregistered name is an error here.
    pub async fn get_identified(&self, name: &str, identifier: &str) -> Result<ModelHandle> {
        let factory = self.factory(name)?;
        let mut handle = factory.produce(self.context())?;

        if !identifier.trim().is_empty() {
            if !handle.metadata().is_storable() {
                return Err(ModelError::NotStorable(name.to_string()));
            }
            let store = self.require_store(name)?;
            let model_name = handle.model_name().to_string();
            if let Some(attributes) = store.load_attributes(&model_name, identifier).await? {
                handle.put_attributes(attributes).await?;
            }
            debug!(name, identifier, "hydrated model instance");
        }

        handle.initialize();
        Ok(handle)
    }

    /// First stored document matching `condition`, hydrated.
    pub async fn find_one(&self, name: &str, condition: &Condition) -> Result<Option<ModelHandle>> {
        let factory = self.factory(name)?;
        let store = self.require_store(name)?;
        match store.find_one(factory.model_name(), condition).await? {
            Some(row) => Ok(Some(self.hydrate(&factory, &row).await?)),
            None => Ok(None),
        }
    }

    /// Every stored document matching `condition`, hydrated, in row order.
    pub async fn find_all(&self, name: &str, condition: &Condition) -> Result<Vec<ModelHandle>> {
        let factory = self.factory(name)?;
        let store = self.require_store(name)?;
        let rows = store.find_all(factory.model_name(), condition).await?;
        let mut handles = Vec::with_capacity(rows.len());
        for row in &rows {
            handles.push(self.hydrate(&factory, row).await?);
        }
        Ok(handles)
    }

    fn factory(&self, name: &str) -> Result<Arc<ModelFactory>> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::ModelNotRegistered(name.to_string()))
    }

    fn require_store(&self, name: &str) -> Result<&DocumentStore> {
        self.store
            .as_ref()
            .ok_or_else(|| ModelError::StoreUnavailable(name.to_string()))
    }

    fn context(&self) -> EventContext {
        match &self.store {
            Some(store) => EventContext::with_store(store.clone()),
            None => EventContext::new(),
        }
    }

    async fn hydrate(&self, factory: &ModelFactory, row: &StoredDocument) -> Result<ModelHandle> {
        let mut handle = factory.produce(self.context())?;
        if let Some(attributes) = row.attributes()? {
            handle.put_attributes(attributes).await?;
        }
        handle.initialize();
        Ok(handle)
    }
}
