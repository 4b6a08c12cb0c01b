//! Moving items between key layouts.
//!
//! When an entity's key or index layout changes, items written under the
//! old layout are read, decoded (and upgraded) as the entity, and written
//! back under the layout the entity computes today. A move is a create at
//! the new key plus a delete at the old one in the same transaction, so a
//! re-run finds both conditions false and skips the work.
//!
//! Every write back is guarded by the item as it was read. An item changed
//! by a concurrent writer in between is read again, up to
//! [`REKEY_ATTEMPTS`] times.

use onetable_core::entities::Entity;
use onetable_core::keys::Key;
use onetable_core::storage::{QueryRequest, RepositoryError, Result, TransactOp};

use super::{ChunkOutcome, Coordinator, CoordinatorResult, TransactionBuilder};
use crate::ops;
use crate::pagination::collect_all;
use crate::table::decode;

/// Reads of one item before a re-key gives up on a contended item.
pub const REKEY_ATTEMPTS: usize = 3;

/// Summary of a bulk re-key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RekeyReport {
    pub scanned: usize,
    /// Items written under a new primary key.
    pub moved: usize,
    /// Items whose key was unchanged; rewritten for their index attributes.
    pub refreshed: usize,
    pub chunks: Vec<ChunkOutcome>,
}

impl Coordinator {
    /// Moves one item stored at `from` to the layout of `E`.
    #[tracing::instrument(skip(self, from), fields(entity_type = E::ENTITY_TYPE, from = %from))]
    pub async fn rekey<E: Entity>(&self, from: &Key) -> Result<E> {
        let mut attempt = 1;
        loop {
            match self.rekey_once::<E>(from).await {
                Err(RepositoryError::Conflict(reason)) if attempt < REKEY_ATTEMPTS => {
                    tracing::debug!(attempt, reason = %reason, "item changed while re-keying, reading again");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn rekey_once<E: Entity>(&self, from: &Key) -> Result<E> {
        let snapshot = self
            .table
            .get_item(from)
            .await?
            .ok_or_else(|| E::not_found(from))?;
        let entity = decode::<E>(snapshot.clone())?;
        let to = entity.key();

        let mut tx = TransactionBuilder::new();
        if &to == from {
            tx.push(ops::replace(&entity, &snapshot)?);
        } else {
            tx.push_or(ops::add(&entity)?, entity.already_exists())
                .push(ops::delete_unchanged(from.clone(), &snapshot));
        }
        tx.commit(&self.table).await?;

        if &to != from {
            tracing::debug!(to = %to, "item moved");
        }
        Ok(entity)
    }

    /// Moves every item matched by `request` to the layout of `E`.
    ///
    /// Moves are written in atomic chunks. Items that keep their key are
    /// refreshed one at a time through [`Coordinator::rekey`], so a
    /// concurrent update to one of them is re-read instead of overwritten.
    #[tracing::instrument(skip(self, request), fields(entity_type = E::ENTITY_TYPE))]
    pub async fn rekey_all<E: Entity>(&self, request: QueryRequest) -> CoordinatorResult<RekeyReport> {
        let items = collect_all(self.table.generate_items(request)).await?;
        let mut report = RekeyReport {
            scanned: items.len(),
            ..RekeyReport::default()
        };

        let mut groups: Vec<Vec<TransactOp>> = Vec::with_capacity(items.len());
        for item in items {
            let Some(from) = Key::from_item(&item) else {
                tracing::warn!("skipping item without a primary key");
                continue;
            };
            let entity = decode::<E>(item.clone())?;
            if entity.key() == from {
                self.rekey::<E>(&from).await?;
                report.refreshed += 1;
            } else {
                groups.push(vec![ops::add(&entity)?, ops::delete_unchanged(from, &item)]);
                report.moved += 1;
            }
        }

        report.chunks = self.chunked_writer().write_groups(groups).await?;

        tracing::info!(
            scanned = report.scanned,
            moved = report.moved,
            refreshed = report.refreshed,
            chunks = report.chunks.len(),
            "re-key finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use onetable_core::entities::{Like, LikeStatus, Post, PostType};
    use onetable_core::expression::{Condition, KeyCondition, Update};
    use onetable_core::item::{AttributeValue, Item};
    use onetable_core::keys::{self, PARTITION_KEY, SORT_KEY};
    use onetable_core::storage::{Page, ReadConsistency, StorageEngine, StorageResult};

    use super::*;
    use crate::storage::InMemoryEngine;
    use crate::table::Table;

    /// A like as an older layout stored it: under the post, without indexes.
    fn legacy_like(user_id: &str, post_id: &str) -> (Key, Item) {
        let like = Like::new(user_id, post_id, "owner", LikeStatus::Onymous);
        let mut item = like.to_item().unwrap();
        item.retain(|name, _| !name.starts_with("gsi"));
        let key = Key::new(format!("post/{post_id}"), format!("like/{user_id}"));
        item.insert(PARTITION_KEY.to_string(), AttributeValue::from(key.partition_key.clone()));
        item.insert(SORT_KEY.to_string(), AttributeValue::from(key.sort_key.clone()));
        (key, item)
    }

    async fn coordinator_with(items: &[Item], max: usize) -> Coordinator {
        let table = Table::new(InMemoryEngine::new().with_max_transact_items(max));
        for item in items {
            table.engine().put(item, None).await.unwrap();
        }
        Coordinator::new(table)
    }

    #[tokio::test]
    async fn test_rekey_moves_single_item() {
        let (old_key, item) = legacy_like("u1", "p1");
        let coordinator = coordinator_with(&[item], 25).await;

        let like: Like = coordinator.rekey(&old_key).await.unwrap();

        assert_eq!(like.post_id, "p1");
        assert!(coordinator.table().get_item(&old_key).await.unwrap().is_none());
        assert!(coordinator
            .table()
            .get_item(&keys::like_key("u1", "p1"))
            .await
            .unwrap()
            .is_some());

        let again = coordinator.rekey::<Like>(&old_key).await;
        assert!(matches!(again, Err(RepositoryError::NotLiked { .. })));
    }

    #[tokio::test]
    async fn test_rekey_all_populates_indexes() {
        let items: Vec<Item> = (0..7).map(|i| legacy_like(&format!("u{i}"), "p1").1).collect();
        let coordinator = coordinator_with(&items, 4).await;
        let request = QueryRequest::table(
            KeyCondition::partition("post/p1").begins_with("like/"),
        );

        let report = coordinator.rekey_all::<Like>(request).await.unwrap();

        assert_eq!(report.scanned, 7);
        assert_eq!(report.moved, 7);
        assert_eq!(report.chunks, vec![ChunkOutcome::Applied; 4]);

        let likes = collect_all(coordinator.likes().generate_by_post("p1", None))
            .await
            .unwrap();
        assert_eq!(likes.len(), 7);
    }

    /// Applies one extra update right before the next transaction, the way
    /// another writer landing between a read and its write-back would.
    struct InterleavedEngine {
        inner: InMemoryEngine,
        pending: Mutex<Option<(Key, Update)>>,
    }

    #[async_trait]
    impl StorageEngine for InterleavedEngine {
        async fn get(&self, key: &Key, consistency: ReadConsistency) -> StorageResult<Option<Item>> {
            self.inner.get(key, consistency).await
        }

        async fn put(&self, item: &Item, condition: Option<&Condition>) -> StorageResult<()> {
            self.inner.put(item, condition).await
        }

        async fn update(&self, key: &Key, update: &Update, condition: Option<&Condition>) -> StorageResult<Item> {
            self.inner.update(key, update, condition).await
        }

        async fn delete(&self, key: &Key, condition: Option<&Condition>) -> StorageResult<Option<Item>> {
            self.inner.delete(key, condition).await
        }

        async fn transact_write(&self, ops: &[TransactOp]) -> StorageResult<()> {
            let pending = self.pending.lock().await.take();
            if let Some((key, update)) = pending {
                self.inner.update(&key, &update, None).await?;
            }
            self.inner.transact_write(ops).await
        }

        async fn query(&self, request: &QueryRequest) -> StorageResult<Page> {
            self.inner.query(request).await
        }

        async fn batch_get(&self, keys: &[Key], projection: Option<&[String]>) -> StorageResult<Vec<Item>> {
            self.inner.batch_get(keys, projection).await
        }
    }

    /// Post p1 stored without a like, plus a like landing mid re-key.
    async fn contended_post() -> Coordinator {
        let inner = InMemoryEngine::new();
        let post = Post::new("u1", PostType::Image).with_id("p1");
        inner.put(&post.to_item().unwrap(), None).await.unwrap();
        let like = Update::new().add(Post::ONYMOUS_LIKE_COUNT, 1);
        Coordinator::new(Table::new(InterleavedEngine {
            inner,
            pending: Mutex::new(Some((keys::post_key("p1"), like))),
        }))
    }

    #[tokio::test]
    async fn test_rekey_keeps_concurrent_update() {
        let coordinator = contended_post().await;

        let post: Post = coordinator.rekey(&keys::post_key("p1")).await.unwrap();

        assert_eq!(post.onymous_like_count, 1);
        let stored: Post = coordinator
            .table()
            .get_consistent(&keys::post_key("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.onymous_like_count, 1);
    }

    #[tokio::test]
    async fn test_rekey_all_refresh_keeps_concurrent_update() {
        let coordinator = contended_post().await;
        let request = QueryRequest::table(KeyCondition::partition("post/p1"));

        let report = coordinator.rekey_all::<Post>(request).await.unwrap();

        assert_eq!(report.refreshed, 1);
        assert_eq!(report.moved, 0);
        let stored: Post = coordinator
            .table()
            .get_consistent(&keys::post_key("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.onymous_like_count, 1);
    }
}
