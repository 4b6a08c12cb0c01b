use onetable_core::entities::Feed;
use onetable_core::expression::KeyCondition;
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `Feed` items.
#[derive(Debug, Clone)]
pub struct FeedRepository {
    table: Table,
}

impl FeedRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, feed_user_id: &str, post_id: &str) -> Result<Option<Feed>> {
        self.table.get(&keys::feed_key(feed_user_id, post_id)).await
    }

    pub async fn add(&self, feed: Feed) -> Result<Feed> {
        self.table.add(feed).await
    }

    pub async fn delete(&self, feed_user_id: &str, post_id: &str) -> Result<Option<Feed>> {
        self.table.delete(&keys::feed_key(feed_user_id, post_id)).await
    }

    /// A user's feed, newest first.
    pub fn generate(&self, feed_user_id: &str) -> ResultStream<Feed> {
        let condition = KeyCondition::partition(keys::feed_partition(feed_user_id));
        self.table
            .generate(QueryRequest::index(IndexSlot::A1, condition).reverse())
    }

    /// Posts of one poster in a user's feed, newest first.
    pub fn generate_by_poster(&self, feed_user_id: &str, posted_by_user_id: &str) -> ResultStream<Feed> {
        let condition =
            KeyCondition::partition(keys::feed_by_poster_partition(feed_user_id, posted_by_user_id));
        self.table
            .generate(QueryRequest::index(IndexSlot::K2, condition).reverse())
    }

    pub fn delete_op(feed_user_id: &str, post_id: &str) -> TransactOp {
        ops::delete(keys::feed_key(feed_user_id, post_id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use onetable_core::timestamp;

    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;

    #[tokio::test]
    async fn test_feed_newest_first_and_by_poster() {
        let repo = FeedRepository::new(Table::new(InMemoryEngine::new().with_page_size(1)));
        let at = timestamp::now();
        repo.add(Feed::new("u1", "p1", "a", at)).await.unwrap();
        repo.add(Feed::new("u1", "p2", "b", at + Duration::seconds(1)))
            .await
            .unwrap();
        repo.add(Feed::new("u1", "p3", "a", at + Duration::seconds(2)))
            .await
            .unwrap();

        let feed = collect_all(repo.generate("u1")).await.unwrap();
        let from_a = collect_all(repo.generate_by_poster("u1", "a")).await.unwrap();

        let ids = |items: &[Feed]| items.iter().map(|f| f.post_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&feed), vec!["p3", "p2", "p1"]);
        assert_eq!(ids(&from_a), vec!["p3", "p1"]);
    }
}
