use onetable_core::entities::Comment;
use onetable_core::expression::KeyCondition;
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `Comment` items.
#[derive(Debug, Clone)]
pub struct CommentRepository {
    table: Table,
}

impl CommentRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, comment_id: &str) -> Result<Option<Comment>> {
        self.table.get(&keys::comment_key(comment_id)).await
    }

    pub async fn require(&self, comment_id: &str) -> Result<Comment> {
        self.table.require(&keys::comment_key(comment_id)).await
    }

    /// Comments on a post, oldest first.
    pub fn generate_by_post(&self, post_id: &str) -> ResultStream<Comment> {
        let condition = KeyCondition::partition(keys::comments_partition(post_id));
        self.table.generate(QueryRequest::index(IndexSlot::A1, condition))
    }

    /// Comments written by a user, newest first.
    pub fn generate_by_user(&self, user_id: &str) -> ResultStream<Comment> {
        let condition = KeyCondition::partition(keys::comments_partition(user_id));
        self.table
            .generate(QueryRequest::index(IndexSlot::A2, condition).reverse())
    }

    pub fn add_op(comment: &Comment) -> Result<TransactOp> {
        ops::add(comment)
    }

    pub fn delete_existing_op(comment_id: &str) -> TransactOp {
        ops::delete_existing(keys::comment_key(comment_id))
    }

    pub fn increment_count_op(comment_id: &str, field: &str) -> TransactOp {
        ops::increment(keys::comment_key(comment_id), field, 1)
    }

    pub fn decrement_count_op(comment_id: &str, field: &str) -> TransactOp {
        ops::decrement(keys::comment_key(comment_id), field, 1)
    }
}
