use chrono::{DateTime, Utc};

use onetable_core::entities::View;
use onetable_core::expression::{KeyCondition, Update};
use onetable_core::keys::{self, IndexSlot, ItemKind, ItemRef, KeyPrefix};
use onetable_core::storage::{QueryRequest, RepositoryError, Result, TransactOp};
use onetable_core::timestamp;

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `View` items.
#[derive(Debug, Clone)]
pub struct ViewRepository {
    table: Table,
}

impl ViewRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, item: &ItemRef, user_id: &str) -> Result<Option<View>> {
        self.table.get(&keys::view_key(item, user_id)).await
    }

    pub async fn get_consistent(&self, item: &ItemRef, user_id: &str) -> Result<Option<View>> {
        self.table.get_consistent(&keys::view_key(item, user_id)).await
    }

    /// Creates the view; fails with `ViewAlreadyExists` if there is one.
    pub async fn add(&self, view: View) -> Result<View> {
        self.table.add(view).await
    }

    /// Removes the view; fails with `ViewDoesNotExist` when there is none.
    pub async fn delete(&self, item: &ItemRef, user_id: &str) -> Result<View> {
        self.table.delete_existing(&keys::view_key(item, user_id)).await
    }

    /// Records `view_count` more views at `viewed_at`.
    ///
    /// Creates the view on first sight. Returns the stored view and whether
    /// it was created by this call.
    pub async fn record_view(
        &self,
        item: &ItemRef,
        user_id: &str,
        view_count: i64,
        viewed_at: DateTime<Utc>,
    ) -> Result<(View, bool)> {
        match self.add(View::new(item, user_id, view_count, viewed_at)).await {
            Ok(view) => Ok((view, true)),
            Err(RepositoryError::ViewAlreadyExists { .. }) => {
                let view = self
                    .table
                    .update(
                        &keys::view_key(item, user_id),
                        &Self::repeat_update(item.kind, user_id, view_count, viewed_at),
                    )
                    .await?;
                Ok((view, false))
            }
            Err(err) => Err(err),
        }
    }

    /// Viewers of an item in order of first view.
    pub fn generate_viewers(&self, item: &ItemRef) -> ResultStream<View> {
        let condition = KeyCondition::partition(item.partition_key())
            .begins_with(KeyPrefix::View.begins_with());
        self.table.generate(QueryRequest::index(IndexSlot::K1, condition))
    }

    /// Items a user viewed, most recent first, optionally of one kind.
    pub fn generate_by_user(&self, user_id: &str, kind: Option<ItemKind>) -> ResultStream<View> {
        let mut condition = KeyCondition::partition(keys::views_by_user_partition(user_id));
        if let Some(kind) = kind {
            condition = condition.begins_with(keys::item_kind_prefix(kind));
        }
        self.table
            .generate(QueryRequest::index(IndexSlot::A1, condition).reverse())
    }

    pub fn add_op(view: &View) -> Result<TransactOp> {
        ops::add(view)
    }

    /// Counts more views on an existing view.
    pub fn record_repeat_op(
        item: &ItemRef,
        user_id: &str,
        view_count: i64,
        viewed_at: DateTime<Utc>,
    ) -> TransactOp {
        ops::update_existing(
            keys::view_key(item, user_id),
            Self::repeat_update(item.kind, user_id, view_count, viewed_at),
        )
    }

    fn repeat_update(kind: ItemKind, user_id: &str, view_count: i64, viewed_at: DateTime<Utc>) -> Update {
        Update::new()
            .add(View::VIEW_COUNT, view_count)
            .set(View::LAST_VIEWED_AT, timestamp::format(viewed_at))
            .set_index(&keys::view_a1(user_id, kind, viewed_at))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;

    fn repo() -> ViewRepository {
        ViewRepository::new(Table::new(InMemoryEngine::new()))
    }

    #[tokio::test]
    async fn test_record_view_creates_then_counts() {
        let repo = repo();
        let post = ItemRef::post("p1");
        let first = timestamp::now();

        let (view, created) = repo.record_view(&post, "u1", 1, first).await.unwrap();
        assert!(created);
        assert_eq!(view.view_count, 1);

        let later = first + Duration::minutes(3);
        let (view, created) = repo.record_view(&post, "u1", 2, later).await.unwrap();
        assert!(!created);
        assert_eq!(view.view_count, 3);
        assert_eq!(view.first_viewed_at, first);
        assert_eq!(view.last_viewed_at, later);
    }

    #[tokio::test]
    async fn test_delete_missing_view_is_view_does_not_exist() {
        let result = repo().delete(&ItemRef::post("p1"), "u1").await;
        assert_eq!(
            result,
            Err(RepositoryError::ViewDoesNotExist {
                item: "post/p1".to_string(),
                user_id: "u1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_views_by_user_follow_last_view() {
        let repo = repo();
        let at = timestamp::now();
        repo.record_view(&ItemRef::post("p1"), "u1", 1, at).await.unwrap();
        repo.record_view(&ItemRef::post("p2"), "u1", 1, at + Duration::seconds(1))
            .await
            .unwrap();
        repo.record_view(&ItemRef::post("p1"), "u1", 1, at + Duration::seconds(2))
            .await
            .unwrap();
        repo.record_view(&ItemRef::chat("c1"), "u1", 1, at).await.unwrap();

        let posts = collect_all(repo.generate_by_user("u1", Some(ItemKind::Post)))
            .await
            .unwrap();
        let ids: Vec<_> = posts.iter().map(|v| v.item_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);

        let viewers = collect_all(repo.generate_viewers(&ItemRef::post("p1")))
            .await
            .unwrap();
        assert_eq!(viewers.len(), 1);
    }
}
