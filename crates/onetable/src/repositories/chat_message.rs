use onetable_core::entities::ChatMessage;
use onetable_core::expression::{KeyCondition, Update};
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, Result, TransactOp};
use onetable_core::timestamp;

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::{Decrement, Table};

/// Access to `ChatMessage` items.
#[derive(Debug, Clone)]
pub struct ChatMessageRepository {
    table: Table,
}

impl ChatMessageRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, message_id: &str) -> Result<Option<ChatMessage>> {
        self.table.get(&keys::chat_message_key(message_id)).await
    }

    pub async fn require(&self, message_id: &str) -> Result<ChatMessage> {
        self.table.require(&keys::chat_message_key(message_id)).await
    }

    pub async fn delete(&self, message_id: &str) -> Result<Option<ChatMessage>> {
        self.table.delete(&keys::chat_message_key(message_id)).await
    }

    /// Replaces the text and stamps the edit time.
    pub async fn edit_text(&self, message_id: &str, text: &str) -> Result<ChatMessage> {
        let update = Update::new()
            .set(ChatMessage::TEXT, text)
            .set(ChatMessage::LAST_EDITED_AT, timestamp::format(timestamp::now()));
        self.table
            .update(&keys::chat_message_key(message_id), &update)
            .await
    }

    /// Messages of a chat, oldest first.
    pub fn generate_by_chat(&self, chat_id: &str) -> ResultStream<ChatMessage> {
        let condition = KeyCondition::partition(keys::chat_messages_partition(chat_id));
        self.table.generate(QueryRequest::index(IndexSlot::A1, condition))
    }

    /// Messages of a chat, newest first.
    pub fn generate_by_chat_reverse(&self, chat_id: &str) -> ResultStream<ChatMessage> {
        let condition = KeyCondition::partition(keys::chat_messages_partition(chat_id));
        self.table
            .generate(QueryRequest::index(IndexSlot::A1, condition).reverse())
    }

    pub async fn decrement_count(
        &self,
        message_id: &str,
        field: &str,
        fail_soft: bool,
    ) -> Result<Decrement<ChatMessage>> {
        self.table
            .decrement_counter(&keys::chat_message_key(message_id), field, 1, fail_soft)
            .await
    }

    pub fn add_op(message: &ChatMessage) -> Result<TransactOp> {
        ops::add(message)
    }

    pub fn increment_count_op(message_id: &str, field: &str) -> TransactOp {
        ops::increment(keys::chat_message_key(message_id), field, 1)
    }

    pub fn decrement_count_op(message_id: &str, field: &str) -> TransactOp {
        ops::decrement(keys::chat_message_key(message_id), field, 1)
    }
}
