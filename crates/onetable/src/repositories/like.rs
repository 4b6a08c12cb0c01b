use onetable_core::entities::{Like, LikeStatus};
use onetable_core::expression::{KeyCondition, SortKeyCondition};
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `Like` items.
#[derive(Debug, Clone)]
pub struct LikeRepository {
    table: Table,
}

impl LikeRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, liked_by_user_id: &str, post_id: &str) -> Result<Option<Like>> {
        self.table
            .get(&keys::like_key(liked_by_user_id, post_id))
            .await
    }

    pub async fn get_consistent(&self, liked_by_user_id: &str, post_id: &str) -> Result<Option<Like>> {
        self.table
            .get_consistent(&keys::like_key(liked_by_user_id, post_id))
            .await
    }

    /// Likes given by a user, newest first within a status.
    pub fn generate_by_user(&self, liked_by_user_id: &str, status: Option<LikeStatus>) -> ResultStream<Like> {
        let mut condition = KeyCondition::partition(keys::likes_partition(liked_by_user_id));
        if let Some(status) = status {
            condition = condition.begins_with(keys::like_status_prefix(status));
        }
        self.table
            .generate(QueryRequest::index(IndexSlot::A1, condition).reverse())
    }

    /// Likes of a post, oldest first within a status.
    pub fn generate_by_post(&self, post_id: &str, status: Option<LikeStatus>) -> ResultStream<Like> {
        let mut condition = KeyCondition::partition(keys::likes_partition(post_id));
        if let Some(status) = status {
            condition = condition.begins_with(keys::like_status_prefix(status));
        }
        self.table.generate(QueryRequest::index(IndexSlot::A2, condition))
    }

    /// Every like one user gave to posts of another, for cleanup when they
    /// stop being able to see each other.
    pub fn generate_by_poster_and_liker(
        &self,
        posted_by_user_id: &str,
        liked_by_user_id: &str,
    ) -> ResultStream<Like> {
        let condition = KeyCondition::partition(keys::likes_partition(posted_by_user_id))
            .sort_key(SortKeyCondition::Eq(liked_by_user_id.into()));
        self.table.generate(QueryRequest::index(IndexSlot::K2, condition))
    }

    pub fn add_op(like: &Like) -> Result<TransactOp> {
        ops::add(like)
    }

    pub fn delete_existing_op(liked_by_user_id: &str, post_id: &str) -> TransactOp {
        ops::delete_existing(keys::like_key(liked_by_user_id, post_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;

    #[tokio::test]
    async fn test_likes_by_status_and_poster() {
        let table = Table::new(InMemoryEngine::new());
        let repo = LikeRepository::new(table.clone());
        table
            .add(Like::new("u1", "p1", "owner", LikeStatus::Onymous))
            .await
            .unwrap();
        table
            .add(Like::new("u1", "p2", "owner", LikeStatus::Anonymous))
            .await
            .unwrap();
        table
            .add(Like::new("u2", "p1", "owner", LikeStatus::Onymous))
            .await
            .unwrap();

        let onymous = collect_all(repo.generate_by_user("u1", Some(LikeStatus::Onymous)))
            .await
            .unwrap();
        let on_p1 = collect_all(repo.generate_by_post("p1", None)).await.unwrap();
        let u1_on_owner = collect_all(repo.generate_by_poster_and_liker("owner", "u1"))
            .await
            .unwrap();

        assert_eq!(onymous.len(), 1);
        assert_eq!(onymous[0].post_id, "p1");
        assert_eq!(on_p1.len(), 2);
        assert_eq!(u1_on_owner.len(), 2);
    }
}
