use super::{DocumentUpdate, NewDocument, RowFilter, StorageEngine, StoredDocument};
use crate::core::{ModelError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-process engine holding every row, valid or not, in insertion order.
pub struct MemoryEngine {
    rows: RwLock<Vec<StoredDocument>>,
    next_id: AtomicU64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Copy of every row, including invalidated ones.
    pub async fn snapshot(&self) -> Vec<StoredDocument> {
        self.rows.read().await.clone()
    }

    /// Total row count, including invalidated rows.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find_rows(&self, filter: &RowFilter) -> Result<Vec<StoredDocument>> {
        let rows = self.rows.read().await;
        let selected = rows.iter().filter(|row| filter.matches(row)).cloned();
        Ok(match filter.limit() {
            Some(limit) => selected.take(limit).collect(),
            None => selected.collect(),
        })
    }

    async fn insert_row(&self, row: NewDocument) -> Result<u64> {
        // Check and insert under one write lock so concurrent inserts of the
        // same identity cannot both succeed.
        let mut rows = self.rows.write().await;
        let taken = rows.iter().any(|existing| {
            existing.valid
                && existing.model_name == row.model_name
                && existing.identifier == row.identifier
        });
        if taken {
            return Err(ModelError::ConstraintViolation(format!(
                "a valid {} document '{}' already exists",
                row.model_name, row.identifier
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        rows.push(StoredDocument {
            id,
            identifier: row.identifier,
            model_name: row.model_name,
            attributions: row.attributions,
            ctime: row.ctime,
            utime: row.ctime,
            valid: true,
        });
        Ok(id)
    }

    async fn update_row(&self, id: u64, update: DocumentUpdate) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.id == id && row.valid) {
            Some(row) => {
                row.attributions = update.attributions;
                row.utime = update.utime;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn invalidate_row(&self, id: u64, utime: i64) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|row| row.id == id && row.valid) {
            Some(row) => {
                row.valid = false;
                row.utime = utime;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
