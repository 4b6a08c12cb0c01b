use onetable_core::entities::{Entity, Post, PostStatus};
use onetable_core::expression::{Condition, KeyCondition, Update};
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, RepositoryError, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::{Decrement, Table};

/// Access to `Post` items.
#[derive(Debug, Clone)]
pub struct PostRepository {
    table: Table,
}

impl PostRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, post_id: &str) -> Result<Option<Post>> {
        self.table.get(&keys::post_key(post_id)).await
    }

    pub async fn require(&self, post_id: &str) -> Result<Post> {
        self.table.require(&keys::post_key(post_id)).await
    }

    pub async fn add(&self, post: Post) -> Result<Post> {
        self.table.add(post).await
    }

    pub async fn delete(&self, post_id: &str) -> Result<Option<Post>> {
        self.table.delete(&keys::post_key(post_id)).await
    }

    /// Moves a post to `next`, rewriting the status-bearing index keys.
    ///
    /// Illegal transitions fail with `InvalidTransition` before any write.
    /// The write is conditioned on the status that was read, so a concurrent
    /// transition surfaces as `StatusConflict`.
    pub async fn transition_status(&self, post_id: &str, next: PostStatus) -> Result<Post> {
        let key = keys::post_key(post_id);
        let post: Post = self
            .table
            .get_consistent(&key)
            .await?
            .ok_or_else(|| Post::not_found(&key))?;

        if !post.post_status.can_transition_to(next) {
            return Err(RepositoryError::InvalidTransition {
                entity_type: Post::ENTITY_TYPE,
                from: post.post_status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        let update = post
            .status_index_keys(next)
            .iter()
            .fold(Update::new().set(Post::POST_STATUS, next.as_str()), |update, index| {
                update.set_index(index)
            });

        self.table
            .transition(&key, Post::POST_STATUS, post.post_status.as_str(), &update)
            .await
    }

    /// Posts of a user, newest first, optionally restricted to one status.
    pub fn generate_by_user(&self, user_id: &str, status: Option<PostStatus>) -> ResultStream<Post> {
        let mut condition = KeyCondition::partition(keys::posts_by_user_partition(user_id));
        if let Some(status) = status {
            condition = condition.begins_with(keys::post_status_prefix(status));
        }
        self.table
            .generate(QueryRequest::index(IndexSlot::A2, condition).reverse())
    }

    /// Expiring posts of a user in one status, soonest expiry first.
    pub fn generate_expiring(&self, user_id: &str, status: PostStatus) -> ResultStream<Post> {
        let condition = KeyCondition::partition(keys::posts_by_user_partition(user_id))
            .begins_with(keys::post_status_prefix(status));
        self.table.generate(QueryRequest::index(IndexSlot::A1, condition))
    }

    /// Posts of an album in rank order.
    pub fn generate_by_album(&self, album_id: &str) -> ResultStream<Post> {
        let condition = KeyCondition::partition(keys::album_posts_partition(album_id));
        self.table.generate(QueryRequest::index(IndexSlot::A3, condition))
    }

    pub async fn increment_count(&self, post_id: &str, field: &str) -> Result<Post> {
        self.table
            .increment_counter(&keys::post_key(post_id), field, 1)
            .await
    }

    pub async fn decrement_count(
        &self,
        post_id: &str,
        field: &str,
        fail_soft: bool,
    ) -> Result<Decrement<Post>> {
        self.table
            .decrement_counter(&keys::post_key(post_id), field, 1, fail_soft)
            .await
    }

    pub fn increment_count_op(post_id: &str, field: &str) -> TransactOp {
        ops::increment(keys::post_key(post_id), field, 1)
    }

    pub fn decrement_count_op(post_id: &str, field: &str) -> TransactOp {
        ops::decrement(keys::post_key(post_id), field, 1)
    }

    pub fn check_exists_op(post_id: &str) -> TransactOp {
        ops::check_exists(keys::post_key(post_id))
    }

    /// Places a post that is in no album at `rank` in `album_id`.
    pub fn set_album_op(post_id: &str, album_id: &str, rank: &str) -> TransactOp {
        let update = Update::new()
            .set(Post::ALBUM_ID, album_id)
            .set(Post::ALBUM_RANK, rank)
            .set_index(&keys::post_a3(album_id, rank));
        let condition = Condition::item_exists()
            .and(Condition::not_exists(Post::ALBUM_ID));
        ops::update_if(keys::post_key(post_id), update, condition)
    }

    /// Re-ranks a post inside the album it already belongs to.
    pub fn set_rank_op(post_id: &str, album_id: &str, rank: &str) -> TransactOp {
        let update = Update::new()
            .set(Post::ALBUM_RANK, rank)
            .set_index(&keys::post_a3(album_id, rank));
        ops::update_if(
            keys::post_key(post_id),
            update,
            Condition::eq(Post::ALBUM_ID, album_id),
        )
    }

    /// Takes a post out of `album_id`.
    pub fn remove_from_album_op(post_id: &str, album_id: &str) -> TransactOp {
        let update = Update::new()
            .remove(Post::ALBUM_ID)
            .remove(Post::ALBUM_RANK)
            .remove_index(IndexSlot::A3);
        ops::update_if(
            keys::post_key(post_id),
            update,
            Condition::eq(Post::ALBUM_ID, album_id),
        )
    }
}
