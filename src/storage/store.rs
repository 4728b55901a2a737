use super::{
    DocumentUpdate, MemoryEngine, NewDocument, RowFilter, StorageEngine, StoreConfig,
    StoredDocument,
};
use crate::attributes::AttributeView;
use crate::core::{ModelError, Result};
use crate::query::sql::{self, SqlStatement};
use crate::query::{compile, Condition};
use crate::schema::Storable;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Generic existence/upsert/fetch over one table of attribute documents.
///
/// Cloning is cheap; every clone shares the same engine.
#[derive(Clone)]
pub struct DocumentStore {
    engine: Arc<dyn StorageEngine>,
    config: Arc<StoreConfig>,
}

impl DocumentStore {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            engine,
            config: Arc::new(StoreConfig::default()),
        }
    }

    pub fn with_config(engine: Arc<dyn StorageEngine>, config: StoreConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|reason| ModelError::Storage(format!("invalid store config: {}", reason)))?;
        Ok(Self {
            engine,
            config: Arc::new(config),
        })
    }

    /// Store backed by a fresh [`MemoryEngine`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// True iff a valid row for the identifier carries non-blank attributes.
    /// A blank identifier is never stored.
    pub async fn exists(&self, model_name: &str, identifier: &str) -> Result<bool> {
        if identifier.trim().is_empty() {
            return Ok(false);
        }
        let row = self.find_identity(model_name, identifier).await?;
        Ok(row.is_some_and(|row| row.has_attributes()))
    }

    /// Upserts the view's attributes under `(view.model_name(), identifier)`.
    pub async fn save(&self, identifier: &str, view: &AttributeView<'_>) -> Result<bool> {
        let model_name = view.model_name().to_string();
        let attributes = view.to_json_map()?;
        self.save_attributes(&model_name, identifier, &attributes)
            .await
    }

    /// Upserts an attribute map. Concurrent saves of one identifier are
    /// last-write-wins.
    pub async fn save_attributes(
        &self,
        model_name: &str,
        identifier: &str,
        attributes: &Map<String, Value>,
    ) -> Result<bool> {
        let attributions = serde_json::to_string(attributes)?;
        self.check_bounds(model_name, identifier, &attributions)?;
        let now = Utc::now().timestamp();

        if let Some(row) = self.find_identity(model_name, identifier).await? {
            return self.update(row.id, attributions, now).await;
        }

        let insert = NewDocument {
            identifier: identifier.to_string(),
            model_name: model_name.to_string(),
            attributions: attributions.clone(),
            ctime: now,
        };
        self.log(|| sql::render_insert(&self.config.table_name, &insert));
        match self.engine.insert_row(insert).await {
            Ok(id) => {
                debug!(model = model_name, identifier, id, "inserted document");
                Ok(true)
            }
            Err(ModelError::ConstraintViolation(reason)) => {
                // Lost an insert race: the winner's row is updated instead.
                warn!(model = model_name, identifier, %reason, "concurrent insert, updating");
                match self.find_identity(model_name, identifier).await? {
                    Some(row) => self.update(row.id, attributions, now).await,
                    None => Err(ModelError::ConstraintViolation(reason)),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Merges the stored attributes into the view. A missing or blank row
    /// leaves the view untouched and yields `false`.
    pub async fn fetch(&self, identifier: &str, view: &mut AttributeView<'_>) -> Result<bool> {
        let model_name = view.model_name().to_string();
        match self.load_attributes(&model_name, identifier).await? {
            Some(attributes) => {
                view.put_all(attributes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Parsed attributes of the identified row, if it has any.
    pub async fn load_attributes(
        &self,
        model_name: &str,
        identifier: &str,
    ) -> Result<Option<Map<String, Value>>> {
        if identifier.trim().is_empty() {
            return Ok(None);
        }
        match self.find_identity(model_name, identifier).await? {
            Some(row) => row.attributes(),
            None => Ok(None),
        }
    }

    pub async fn find_one(
        &self,
        model_name: &str,
        condition: &Condition,
    ) -> Result<Option<StoredDocument>> {
        let filter = RowFilter::matching(model_name, compile(condition)?).with_limit(1);
        self.log(|| sql::render_select(&self.config.table_name, &filter));
        self.engine.find_row(&filter).await
    }

    pub async fn find_all(
        &self,
        model_name: &str,
        condition: &Condition,
    ) -> Result<Vec<StoredDocument>> {
        let filter = RowFilter::matching(model_name, compile(condition)?);
        self.log(|| sql::render_select(&self.config.table_name, &filter));
        self.engine.find_rows(&filter).await
    }

    /// Logically deletes the identified row.
    pub async fn remove(&self, model_name: &str, identifier: &str) -> Result<bool> {
        let Some(row) = self.find_identity(model_name, identifier).await? else {
            return Ok(false);
        };
        let now = Utc::now().timestamp();
        self.log(|| sql::render_invalidate(&self.config.table_name, row.id, now));
        self.engine.invalidate_row(row.id, now).await
    }

    /// Saves a storable model under its own identifier.
    pub async fn save_model<M: Storable>(&self, model: &mut M) -> Result<bool> {
        let identifier = model.identifier().ok_or_else(|| {
            ModelError::ConstraintViolation(format!("{} has no identifier to save under", M::NAME))
        })?;
        let attributes = AttributeView::of(model)?.to_json_map()?;
        self.save_attributes(M::NAME, &identifier, &attributes)
            .await
    }

    /// Merges the stored document for `identifier` into `model`.
    pub async fn fetch_model<M: Storable>(&self, identifier: &str, model: &mut M) -> Result<bool> {
        match self.load_attributes(M::NAME, identifier).await? {
            Some(attributes) => {
                AttributeView::of(model)?.put_all(attributes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn exists_model<M: Storable>(&self, model: &M) -> Result<bool> {
        match model.identifier() {
            Some(identifier) => self.exists(M::NAME, &identifier).await,
            None => Ok(false),
        }
    }

    async fn find_identity(
        &self,
        model_name: &str,
        identifier: &str,
    ) -> Result<Option<StoredDocument>> {
        let filter = RowFilter::identity(model_name, identifier);
        self.log(|| sql::render_select(&self.config.table_name, &filter));
        self.engine.find_row(&filter).await
    }

    async fn update(&self, id: u64, attributions: String, now: i64) -> Result<bool> {
        let update = DocumentUpdate {
            attributions,
            utime: now,
        };
        self.log(|| sql::render_update(&self.config.table_name, id, &update));
        self.engine.update_row(id, update).await
    }

    fn check_bounds(&self, model_name: &str, identifier: &str, attributions: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(ModelError::ConstraintViolation(
                "identifier must not be blank".to_string(),
            ));
        }
        if identifier.chars().count() > self.config.max_identifier_len {
            return Err(ModelError::ConstraintViolation(format!(
                "identifier exceeds {} characters",
                self.config.max_identifier_len
            )));
        }
        if model_name.chars().count() > self.config.max_model_name_len {
            return Err(ModelError::ConstraintViolation(format!(
                "model name exceeds {} characters",
                self.config.max_model_name_len
            )));
        }
        if attributions.len() > self.config.max_attributes_len {
            return Err(ModelError::ConstraintViolation(format!(
                "attributes of {} '{}' exceed {} bytes",
                model_name, identifier, self.config.max_attributes_len
            )));
        }
        Ok(())
    }

    fn log(&self, render: impl FnOnce() -> SqlStatement) {
        if self.config.log_statements {
            let statement = render();
            debug!(
                engine = self.engine.name(),
                sql = %statement.sql,
                params = ?statement.params,
                "executing statement"
            );
        }
    }
}
