//! Entity access over a storage engine.
//!
//! [`Table`] is the handle every repository holds. It is constructed once
//! around an engine and cloned freely; clones share the engine. It turns
//! entities into items and back, attaches the conditions that give each
//! operation its semantics, and translates condition failures into the
//! entity's own domain errors.

use std::sync::Arc;

use onetable_core::entities::{schema_version, Entity};
use onetable_core::expression::{Condition, Update};
use onetable_core::item::{AttributeValue, Item};
use onetable_core::keys::{Key, SCHEMA_VERSION};
use onetable_core::storage::{
    Page, QueryRequest, ReadConsistency, RepositoryError, Result, StorageEngine, StorageError,
    TransactOp,
};

use crate::ops;
use crate::pagination::{self, ResultStream};

/// Decodes an item as `E`, upgrading older shapes in memory.
pub fn decode<E: Entity>(mut item: Item) -> Result<E> {
    let version = schema_version(&item);
    if version < E::SCHEMA_VERSION {
        E::upgrade(version, &mut item)?;
    }
    Ok(E::from_item(&item)?)
}

/// Outcome of a guarded decrement.
#[derive(Debug, Clone, PartialEq)]
pub enum Decrement<E> {
    Applied(E),
    /// The counter was lower than the amount and `fail_soft` was set.
    Skipped,
}

/// Shared handle to the single table.
#[derive(Clone)]
pub struct Table {
    engine: Arc<dyn StorageEngine>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("max_transact_items", &self.engine.max_transact_items())
            .finish()
    }
}

impl Table {
    pub fn new(engine: impl StorageEngine + 'static) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn from_arc(engine: Arc<dyn StorageEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> Arc<dyn StorageEngine> {
        self.engine.clone()
    }

    pub fn max_transact_items(&self) -> usize {
        self.engine.max_transact_items()
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Eventually consistent get.
    pub async fn get<E: Entity>(&self, key: &Key) -> Result<Option<E>> {
        self.get_with(key, ReadConsistency::Eventual).await
    }

    /// Strongly consistent get.
    pub async fn get_consistent<E: Entity>(&self, key: &Key) -> Result<Option<E>> {
        self.get_with(key, ReadConsistency::Strong).await
    }

    /// Get that fails with the entity's not-found error.
    pub async fn require<E: Entity>(&self, key: &Key) -> Result<E> {
        self.get::<E>(key).await?.ok_or_else(|| E::not_found(key))
    }

    /// Reads an item and brings it to `E::SCHEMA_VERSION`.
    ///
    /// An item stored at an older version is upgraded and written back,
    /// guarded by its old version. A concurrent writer winning that race is
    /// not an error: the upgraded value is returned either way.
    async fn get_with<E: Entity>(&self, key: &Key, consistency: ReadConsistency) -> Result<Option<E>> {
        let Some(mut item) = self.engine.get(key, consistency).await? else {
            return Ok(None);
        };

        let version = schema_version(&item);
        if version >= E::SCHEMA_VERSION {
            return Ok(Some(E::from_item(&item)?));
        }

        E::upgrade(version, &mut item)?;
        let entity = E::from_item(&item)?;
        item.extend(entity.to_item()?);

        let guard = if version == 0 {
            Condition::eq(SCHEMA_VERSION, 0).or(Condition::not_exists(SCHEMA_VERSION))
        } else {
            Condition::eq(SCHEMA_VERSION, version)
        };
        match self.engine.put(&item, Some(&guard)).await {
            Ok(()) => tracing::debug!(
                entity_type = E::ENTITY_TYPE,
                key = %key,
                from_version = version,
                to_version = E::SCHEMA_VERSION,
                "upgraded item schema"
            ),
            Err(err) if err.is_conflict() => tracing::debug!(
                entity_type = E::ENTITY_TYPE,
                key = %key,
                "item changed during schema upgrade, keeping the concurrent write"
            ),
            Err(err) => tracing::warn!(
                entity_type = E::ENTITY_TYPE,
                key = %key,
                error = %err,
                "failed to write upgraded item"
            ),
        }

        Ok(Some(entity))
    }

    /// Fetches many entities, skipping missing keys.
    pub async fn batch_get<E: Entity>(&self, keys: &[Key]) -> Result<Vec<E>> {
        self.engine
            .batch_get(keys, None)
            .await?
            .into_iter()
            .map(decode::<E>)
            .collect()
    }

    /// Fetches raw items restricted to `projection`.
    pub async fn batch_get_items(&self, keys: &[Key], projection: &[String]) -> Result<Vec<Item>> {
        Ok(self.engine.batch_get(keys, Some(projection)).await?)
    }

    /// One page of raw results.
    pub async fn query_page(&self, request: &QueryRequest) -> Result<Page> {
        Ok(self.engine.query(request).await?)
    }

    /// Every matching item, lazily.
    pub fn generate_items(&self, request: QueryRequest) -> ResultStream<Item> {
        pagination::paginate(self.engine.clone(), request)
    }

    /// Every matching entity, lazily.
    pub fn generate<E: Entity>(&self, request: QueryRequest) -> ResultStream<E> {
        pagination::paginate_entities::<E>(self.engine.clone(), request)
    }

    /// Every matching entity, collected.
    pub async fn collect<E: Entity>(&self, request: QueryRequest) -> Result<Vec<E>> {
        pagination::collect_all(self.generate::<E>(request)).await
    }

    /// The first matching entity.
    pub async fn first<E: Entity>(&self, request: QueryRequest) -> Result<Option<E>> {
        let page = self.engine.query(&request.limit(1)).await?;
        page.items.into_iter().next().map(decode::<E>).transpose()
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Creates `entity`; a taken key fails with the entity's exists error.
    pub async fn add<E: Entity>(&self, entity: E) -> Result<E> {
        let item = entity.to_item()?;
        match self.engine.put(&item, Some(&Condition::item_not_exists())).await {
            Ok(()) => Ok(entity),
            Err(StorageError::ConditionFailed { .. }) => Err(entity.already_exists()),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes `entity` unconditionally.
    pub async fn put<E: Entity>(&self, entity: &E) -> Result<()> {
        let item = entity.to_item()?;
        Ok(self.engine.put(&item, None).await?)
    }

    /// Deletes `key`; absence is not an error. Returns the removed entity.
    pub async fn delete<E: Entity>(&self, key: &Key) -> Result<Option<E>> {
        self.engine
            .delete(key, None)
            .await?
            .map(decode::<E>)
            .transpose()
    }

    /// Deletes `key`, failing with the entity's not-found error when absent.
    pub async fn delete_existing<E: Entity>(&self, key: &Key) -> Result<E> {
        match self.engine.delete(key, Some(&Condition::item_exists())).await {
            Ok(Some(item)) => decode::<E>(item),
            Ok(None) | Err(StorageError::ConditionFailed { .. }) => Err(E::not_found(key)),
            Err(err) => Err(err.into()),
        }
    }

    /// Applies `update` to an existing item.
    pub async fn update<E: Entity>(&self, key: &Key, update: &Update) -> Result<E> {
        self.update_if::<E>(key, update, Condition::item_exists(), |_| E::not_found(key))
            .await
    }

    /// Applies `update` when `condition` holds, mapping a failed condition
    /// through `on_conflict`.
    pub async fn update_if<E: Entity>(
        &self,
        key: &Key,
        update: &Update,
        condition: Condition,
        on_conflict: impl FnOnce(&Key) -> RepositoryError,
    ) -> Result<E> {
        match self.engine.update(key, update, Some(&condition)).await {
            Ok(item) => decode::<E>(item),
            Err(StorageError::ConditionFailed { .. }) => Err(on_conflict(key)),
            Err(err) => Err(err.into()),
        }
    }

    /// Conditional status change: the update applies only while `field`
    /// still holds `expected`.
    pub async fn transition<E: Entity>(
        &self,
        key: &Key,
        field: &str,
        expected: &str,
        update: &Update,
    ) -> Result<E> {
        let condition = Condition::eq(field, expected);
        self.update_if::<E>(key, update, condition, |key| RepositoryError::StatusConflict {
            entity_type: E::ENTITY_TYPE,
            id: key.to_string(),
            expected: expected.to_string(),
        })
        .await
    }

    /// Atomically adds `by` to a counter. A missing counter counts as zero.
    pub async fn increment_counter<E: Entity>(&self, key: &Key, field: &str, by: i64) -> Result<E> {
        self.update::<E>(key, &Update::new().add(field, by)).await
    }

    /// Atomically subtracts `by` from a counter without going below zero.
    ///
    /// Going below zero means a mirror counter has drifted from its source.
    /// That is an invariant violation: logged at error level and returned as
    /// `CounterUnderflow`, unless `fail_soft` marks the counter as
    /// approximate, in which case it is logged and skipped.
    pub async fn decrement_counter<E: Entity>(
        &self,
        key: &Key,
        field: &str,
        by: i64,
        fail_soft: bool,
    ) -> Result<Decrement<E>> {
        let update = Update::new().add(field, -by);
        let guard = ops::decrement_guard(field, by);

        match self.engine.update(key, &update, Some(&guard)).await {
            Ok(item) => Ok(Decrement::Applied(decode::<E>(item)?)),
            Err(StorageError::ConditionFailed { .. }) => {
                if self.engine.get(key, ReadConsistency::Strong).await?.is_none() {
                    return Err(E::not_found(key));
                }
                if fail_soft {
                    tracing::warn!(key = %key, field, by, "counter would drop below zero, skipping");
                    return Ok(Decrement::Skipped);
                }
                tracing::error!(key = %key, field, by, "counter would drop below zero");
                Err(RepositoryError::CounterUnderflow {
                    key: key.to_string(),
                    field: field.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Submits one all-or-nothing transaction. Failed conditions surface as
    /// `RepositoryError::Conflict`; the coordinator maps them further.
    pub async fn transact(&self, ops: &[TransactOp]) -> Result<()> {
        Ok(self.engine.transact_write(ops).await?)
    }

    /// Reads the raw stored item.
    pub async fn get_item(&self, key: &Key) -> Result<Option<Item>> {
        Ok(self.engine.get(key, ReadConsistency::Strong).await?)
    }

    /// Reads one attribute of a stored item.
    pub async fn get_attribute(&self, key: &Key, attribute: &str) -> Result<Option<AttributeValue>> {
        Ok(self
            .get_item(key)
            .await?
            .and_then(|mut item| item.remove(attribute)))
    }
}

#[cfg(test)]
mod tests {
    use onetable_core::entities::{Flag, Post, PostStatus, PostType, User, View};
    use onetable_core::keys::{self, ItemRef};

    use super::*;
    use crate::storage::InMemoryEngine;

    fn table() -> Table {
        Table::new(InMemoryEngine::new())
    }

    #[tokio::test]
    async fn test_add_twice_keeps_first() {
        let table = table();
        let first = User::new("ada").with_id("u1");
        table.add(first.clone()).await.unwrap();

        let second = User::new("grace").with_id("u1");
        let result = table.add(second).await;

        assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
        let stored: User = table.get(&keys::user_key("u1")).await.unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_add_flag_twice_is_already_flagged() {
        let table = table();
        let flag = Flag::new(&ItemRef::post("p1"), "u1");
        table.add(flag.clone()).await.unwrap();

        let result = table.add(Flag::new(&ItemRef::post("p1"), "u1")).await;

        assert_eq!(
            result,
            Err(RepositoryError::AlreadyFlagged {
                item: "post/p1".to_string(),
                user_id: "u1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let table = table();
        let key = keys::post_key("missing");

        assert_eq!(table.delete::<Post>(&key).await.unwrap(), None);
        assert_eq!(table.delete::<Post>(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_existing_reports_domain_error() {
        let table = table();
        let key = keys::flag_key(&ItemRef::post("p1"), "u1");

        let result = table.delete_existing::<Flag>(&key).await;

        assert!(matches!(result, Err(RepositoryError::NotFlagged { .. })));
    }

    #[tokio::test]
    async fn test_counter_round_trip() {
        let table = table();
        let post = Post::new("u1", PostType::TextOnly).with_id("p1");
        table.add(post).await.unwrap();
        let key = keys::post_key("p1");

        table.increment_counter::<Post>(&key, Post::COMMENT_COUNT, 3).await.unwrap();
        let result = table
            .decrement_counter::<Post>(&key, Post::COMMENT_COUNT, 3, false)
            .await
            .unwrap();

        match result {
            Decrement::Applied(post) => assert_eq!(post.comment_count, 0),
            Decrement::Skipped => panic!("decrement skipped"),
        }
    }

    #[tokio::test]
    async fn test_decrement_below_zero() {
        let table = table();
        table.add(Post::new("u1", PostType::Image).with_id("p1")).await.unwrap();
        let key = keys::post_key("p1");

        let strict = table.decrement_counter::<Post>(&key, Post::FLAG_COUNT, 1, false).await;
        assert!(matches!(strict, Err(RepositoryError::CounterUnderflow { .. })));

        let soft = table.decrement_counter::<Post>(&key, Post::FLAG_COUNT, 1, true).await;
        assert_eq!(soft, Ok(Decrement::Skipped));
    }

    #[tokio::test]
    async fn test_increment_missing_item_is_not_found() {
        let table = table();
        let result = table
            .increment_counter::<Post>(&keys::post_key("p1"), Post::COMMENT_COUNT, 1)
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_transition_requires_expected_status() {
        let table = table();
        table.add(Post::new("u1", PostType::Image).with_id("p1")).await.unwrap();
        let key = keys::post_key("p1");
        let update = Update::new().set(Post::POST_STATUS, PostStatus::Completed.as_str());

        let post: Post = table
            .transition(&key, Post::POST_STATUS, PostStatus::Pending.as_str(), &update)
            .await
            .unwrap();
        assert_eq!(post.post_status, PostStatus::Completed);

        let again = table
            .transition::<Post>(&key, Post::POST_STATUS, PostStatus::Pending.as_str(), &update)
            .await;
        assert!(matches!(again, Err(RepositoryError::StatusConflict { .. })));
    }

    #[tokio::test]
    async fn test_get_upgrades_and_writes_back() {
        let table = table();
        let engine = table.engine();
        let view = View::new(&ItemRef::post("p1"), "u1", 4, onetable_core::timestamp::now());
        let mut item = view.to_item().unwrap();
        item.remove(SCHEMA_VERSION);
        item.remove(View::FIRST_VIEWED_AT);
        item.remove(View::VIEW_COUNT);
        engine.put(&item, None).await.unwrap();

        let key = keys::view_key(&ItemRef::post("p1"), "u1");
        let upgraded: View = table.get(&key).await.unwrap().unwrap();

        assert_eq!(upgraded.view_count, 1);
        assert_eq!(upgraded.first_viewed_at, view.last_viewed_at);
        let stored = engine.get(&key, ReadConsistency::Strong).await.unwrap().unwrap();
        assert_eq!(schema_version(&stored), View::SCHEMA_VERSION);
    }
}
