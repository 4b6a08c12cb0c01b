use chrono::{DateTime, Utc};

use onetable_core::entities::Chat;
use onetable_core::expression::{KeyCondition, Update};
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, Result, TransactOp};
use onetable_core::timestamp;

use crate::ops;
use crate::table::{Decrement, Table};

/// Access to `Chat` items.
#[derive(Debug, Clone)]
pub struct ChatRepository {
    table: Table,
}

impl ChatRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, chat_id: &str) -> Result<Option<Chat>> {
        self.table.get(&keys::chat_key(chat_id)).await
    }

    pub async fn require(&self, chat_id: &str) -> Result<Chat> {
        self.table.require(&keys::chat_key(chat_id)).await
    }

    pub async fn add(&self, chat: Chat) -> Result<Chat> {
        self.table.add(chat).await
    }

    pub async fn delete(&self, chat_id: &str) -> Result<Option<Chat>> {
        self.table.delete(&keys::chat_key(chat_id)).await
    }

    /// The direct chat between two users, in either order.
    pub async fn get_direct(&self, user_id: &str, other_user_id: &str) -> Result<Option<Chat>> {
        let condition =
            KeyCondition::partition(keys::direct_chat_partition(user_id, other_user_id));
        self.table
            .first(QueryRequest::index(IndexSlot::A1, condition))
            .await
    }

    pub async fn decrement_count(
        &self,
        chat_id: &str,
        field: &str,
        fail_soft: bool,
    ) -> Result<Decrement<Chat>> {
        self.table
            .decrement_counter(&keys::chat_key(chat_id), field, 1, fail_soft)
            .await
    }

    pub fn add_op(chat: &Chat) -> Result<TransactOp> {
        ops::add(chat)
    }

    pub fn increment_count_op(chat_id: &str, field: &str) -> TransactOp {
        ops::increment(keys::chat_key(chat_id), field, 1)
    }

    pub fn decrement_count_op(chat_id: &str, field: &str) -> TransactOp {
        ops::decrement(keys::chat_key(chat_id), field, 1)
    }

    /// Counts a new message and moves the chat's activity time.
    pub fn record_message_op(chat_id: &str, at: DateTime<Utc>) -> TransactOp {
        let update = Update::new()
            .add(Chat::MESSAGES_COUNT, 1)
            .set(Chat::LAST_MESSAGE_ACTIVITY_AT, timestamp::format(at));
        ops::update_existing(keys::chat_key(chat_id), update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryEngine;

    #[tokio::test]
    async fn test_direct_chat_found_from_either_side() {
        let repo = ChatRepository::new(Table::new(InMemoryEngine::new()));
        repo.add(Chat::direct("u2", "u1").with_id("c1")).await.unwrap();
        repo.add(Chat::group("u1", "team").with_id("c2")).await.unwrap();

        let forward = repo.get_direct("u1", "u2").await.unwrap().unwrap();
        let backward = repo.get_direct("u2", "u1").await.unwrap().unwrap();

        assert_eq!(forward.chat_id, "c1");
        assert_eq!(backward.chat_id, "c1");
        assert!(repo.get_direct("u1", "u3").await.unwrap().is_none());
    }
}
