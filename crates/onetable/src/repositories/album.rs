use onetable_core::entities::Album;
use onetable_core::expression::{KeyCondition, Update};
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::{Decrement, Table};

/// Access to `Album` items.
#[derive(Debug, Clone)]
pub struct AlbumRepository {
    table: Table,
}

impl AlbumRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, album_id: &str) -> Result<Option<Album>> {
        self.table.get(&keys::album_key(album_id)).await
    }

    pub async fn require(&self, album_id: &str) -> Result<Album> {
        self.table.require(&keys::album_key(album_id)).await
    }

    pub async fn add(&self, album: Album) -> Result<Album> {
        self.table.add(album).await
    }

    pub async fn delete(&self, album_id: &str) -> Result<Option<Album>> {
        self.table.delete(&keys::album_key(album_id)).await
    }

    /// Albums owned by a user, newest first.
    pub fn generate_by_user(&self, user_id: &str) -> ResultStream<Album> {
        let condition = KeyCondition::partition(keys::albums_by_user_partition(user_id));
        self.table
            .generate(QueryRequest::index(IndexSlot::K1, condition).reverse())
    }

    pub async fn decrement_count(
        &self,
        album_id: &str,
        field: &str,
        fail_soft: bool,
    ) -> Result<Decrement<Album>> {
        self.table
            .decrement_counter(&keys::album_key(album_id), field, 1, fail_soft)
            .await
    }

    pub fn increment_count_op(album_id: &str, field: &str, by: i64) -> TransactOp {
        ops::increment(keys::album_key(album_id), field, by)
    }

    pub fn decrement_count_op(album_id: &str, field: &str) -> TransactOp {
        ops::decrement(keys::album_key(album_id), field, 1)
    }

    /// Counts one more post and one more rank assignment.
    pub fn add_post_op(album_id: &str) -> TransactOp {
        let update = Update::new()
            .add(Album::POST_COUNT, 1)
            .add(Album::RANK_COUNT, 1);
        ops::update_existing(keys::album_key(album_id), update)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;

    #[tokio::test]
    async fn test_generate_by_user_newest_first() {
        let repo = AlbumRepository::new(Table::new(InMemoryEngine::new()));
        let mut older = Album::new("u1", "old").with_id("a1");
        older.created_at -= Duration::days(1);
        repo.add(older).await.unwrap();
        repo.add(Album::new("u1", "new").with_id("a2")).await.unwrap();
        repo.add(Album::new("u2", "theirs").with_id("a3")).await.unwrap();

        let albums = collect_all(repo.generate_by_user("u1")).await.unwrap();
        let ids: Vec<_> = albums.iter().map(|a| a.album_id.as_str()).collect();

        assert_eq!(ids, vec!["a2", "a1"]);
    }
}
