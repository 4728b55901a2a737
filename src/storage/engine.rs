use super::{DocumentUpdate, NewDocument, RowFilter, StoredDocument};
use crate::core::Result;
use async_trait::async_trait;

/// Storage engine trait - the single-table row contract the document store
/// is written against.
///
/// Implementations must select valid rows only and keep at most one valid
/// row per `(model_name, identifier)`.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Engine name for diagnostics
    fn name(&self) -> &str;

    /// First row (lowest id) selected by the filter
    async fn find_row(&self, filter: &RowFilter) -> Result<Option<StoredDocument>> {
        let limited = filter.clone().with_limit(1);
        Ok(self.find_rows(&limited).await?.into_iter().next())
    }

    /// All rows selected by the filter, in id order
    async fn find_rows(&self, filter: &RowFilter) -> Result<Vec<StoredDocument>>;

    /// Insert a valid row and return its surrogate id.
    ///
    /// Fails with a constraint violation when a valid row with the same
    /// `(model_name, identifier)` already exists.
    async fn insert_row(&self, row: NewDocument) -> Result<u64>;

    /// Replace a valid row's attributes; `false` when no valid row has `id`
    async fn update_row(&self, id: u64, update: DocumentUpdate) -> Result<bool>;

    /// Mark a row invalid (logical delete)
    async fn invalidate_row(&self, id: u64, utime: i64) -> Result<bool>;
}
