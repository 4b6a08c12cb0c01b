use onetable_core::entities::User;
use onetable_core::expression::KeyCondition;
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, Result, TransactOp};

use crate::ops;
use crate::table::{Decrement, Table};

/// Access to `User` items and their counters.
#[derive(Debug, Clone)]
pub struct UserRepository {
    table: Table,
}

impl UserRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<User>> {
        self.table.get(&keys::user_key(user_id)).await
    }

    pub async fn require(&self, user_id: &str) -> Result<User> {
        self.table.require(&keys::user_key(user_id)).await
    }

    /// Looks a user up by username through index A1.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let request = QueryRequest::index(
            IndexSlot::A1,
            KeyCondition::partition(keys::username_partition(username)),
        );
        self.table.first(request).await
    }

    pub async fn add(&self, user: User) -> Result<User> {
        self.table.add(user).await
    }

    pub async fn delete(&self, user_id: &str) -> Result<Option<User>> {
        self.table.delete(&keys::user_key(user_id)).await
    }

    pub async fn increment_count(&self, user_id: &str, field: &str) -> Result<User> {
        self.table
            .increment_counter(&keys::user_key(user_id), field, 1)
            .await
    }

    pub async fn decrement_count(
        &self,
        user_id: &str,
        field: &str,
        fail_soft: bool,
    ) -> Result<Decrement<User>> {
        self.table
            .decrement_counter(&keys::user_key(user_id), field, 1, fail_soft)
            .await
    }

    pub fn increment_count_op(user_id: &str, field: &str) -> TransactOp {
        ops::increment(keys::user_key(user_id), field, 1)
    }

    pub fn decrement_count_op(user_id: &str, field: &str) -> TransactOp {
        ops::decrement(keys::user_key(user_id), field, 1)
    }

    pub fn check_exists_op(user_id: &str) -> TransactOp {
        ops::check_exists(keys::user_key(user_id))
    }
}
