use async_trait::async_trait;

use crate::expression::{Condition, Update};
use crate::item::Item;
use crate::keys::Key;

use super::{Page, QueryRequest, ReadConsistency, StorageResult, TransactOp};

/// A key-value store with conditional writes, atomic counters, bounded
/// transactions and indexed queries.
///
/// Condition failures surface as [`super::StorageError::ConditionFailed`]
/// (single item) or [`super::StorageError::TransactionCanceled`] with the
/// index of the failing operation.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Gets an item by its primary key.
    async fn get(&self, key: &Key, consistency: ReadConsistency) -> StorageResult<Option<Item>>;

    /// Writes a whole item, replacing any item under the same key.
    async fn put(&self, item: &Item, condition: Option<&Condition>) -> StorageResult<()>;

    /// Applies an update and returns the item after the update.
    ///
    /// A missing item is created from the key and the update unless the
    /// condition forbids it.
    async fn update(
        &self,
        key: &Key,
        update: &Update,
        condition: Option<&Condition>,
    ) -> StorageResult<Item>;

    /// Deletes an item and returns the old item, if there was one.
    async fn delete(&self, key: &Key, condition: Option<&Condition>) -> StorageResult<Option<Item>>;

    /// Applies all operations or none of them.
    async fn transact_write(&self, ops: &[TransactOp]) -> StorageResult<()>;

    /// Returns one page of a query.
    async fn query(&self, request: &QueryRequest) -> StorageResult<Page>;

    /// Gets many items at once. Duplicate keys are read once and missing
    /// items are left out.
    async fn batch_get(&self, keys: &[Key], projection: Option<&[String]>) -> StorageResult<Vec<Item>>;

    /// Upper bound on operations per `transact_write`.
    fn max_transact_items(&self) -> usize {
        super::MAX_TRANSACT_ITEMS
    }
}
