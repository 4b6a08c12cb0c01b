use chrono::{DateTime, Utc};

use onetable_core::entities::{ChatMember, Entity};
use onetable_core::expression::{Condition, KeyCondition, Update};
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, RepositoryError, Result, TransactOp};
use onetable_core::timestamp;

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `ChatMember` items and their unviewed-message counter.
#[derive(Debug, Clone)]
pub struct ChatMemberRepository {
    table: Table,
}

impl ChatMemberRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, chat_id: &str, user_id: &str) -> Result<Option<ChatMember>> {
        self.table.get(&keys::chat_member_key(chat_id, user_id)).await
    }

    pub async fn get_consistent(&self, chat_id: &str, user_id: &str) -> Result<Option<ChatMember>> {
        self.table
            .get_consistent(&keys::chat_member_key(chat_id, user_id))
            .await
    }

    pub async fn add(&self, member: ChatMember) -> Result<ChatMember> {
        self.table.add(member).await
    }

    pub async fn delete(&self, chat_id: &str, user_id: &str) -> Result<Option<ChatMember>> {
        self.table
            .delete(&keys::chat_member_key(chat_id, user_id))
            .await
    }

    /// Members of a chat in join order.
    pub fn generate_by_chat(&self, chat_id: &str) -> ResultStream<ChatMember> {
        let condition = KeyCondition::partition(keys::chat_partition(chat_id))
            .begins_with(keys::KeyPrefix::Member.begins_with());
        self.table.generate(QueryRequest::index(IndexSlot::K1, condition))
    }

    /// Chat memberships of a user, most recent activity first.
    pub fn generate_by_user(&self, user_id: &str) -> ResultStream<ChatMember> {
        let condition = KeyCondition::partition(keys::member_chats_partition(user_id));
        self.table
            .generate(QueryRequest::index(IndexSlot::K2, condition).reverse())
    }

    /// Adds one unviewed message. An absent counter counts as zero.
    pub async fn increment_messages_unviewed_count(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<ChatMember> {
        self.table
            .increment_counter(
                &keys::chat_member_key(chat_id, user_id),
                ChatMember::MESSAGES_UNVIEWED_COUNT,
                1,
            )
            .await
    }

    /// Resets the unviewed counter to zero.
    pub async fn clear_messages_unviewed_count(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<ChatMember> {
        self.table
            .update(
                &keys::chat_member_key(chat_id, user_id),
                &Update::new().set(ChatMember::MESSAGES_UNVIEWED_COUNT, 0),
            )
            .await
    }

    /// Resets the unviewed counter only while the member's activity time is
    /// still `activity_at`. Returns `None` when a newer message moved it.
    pub async fn clear_messages_unviewed_count_at(
        &self,
        chat_id: &str,
        user_id: &str,
        activity_at: DateTime<Utc>,
    ) -> Result<Option<ChatMember>> {
        let key = keys::chat_member_key(chat_id, user_id);
        let condition = Condition::item_exists().and(Condition::eq(
            ChatMember::LAST_MESSAGE_ACTIVITY_AT,
            timestamp::format(activity_at),
        ));
        let update = Update::new().set(ChatMember::MESSAGES_UNVIEWED_COUNT, 0);

        match self
            .table
            .update_if::<ChatMember>(&key, &update, condition, |key| RepositoryError::StatusConflict {
                entity_type: ChatMember::ENTITY_TYPE,
                id: key.to_string(),
                expected: timestamp::format(activity_at),
            })
            .await
        {
            Ok(member) => Ok(Some(member)),
            Err(RepositoryError::StatusConflict { .. }) => {
                if self.table.get_item(&key).await?.is_none() {
                    return Err(ChatMember::not_found(&key));
                }
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn add_op(member: &ChatMember) -> Result<TransactOp> {
        ops::add(member)
    }

    pub fn delete_existing_op(chat_id: &str, user_id: &str) -> TransactOp {
        ops::delete_existing(keys::chat_member_key(chat_id, user_id))
    }

    /// Moves the member's activity time and its position in the user's chat list.
    pub fn touch_activity_op(chat_id: &str, user_id: &str, at: DateTime<Utc>) -> TransactOp {
        let update = Update::new()
            .set(ChatMember::LAST_MESSAGE_ACTIVITY_AT, timestamp::format(at))
            .set_index(&keys::chat_member_k2(user_id, at));
        ops::update_existing(keys::chat_member_key(chat_id, user_id), update)
    }

    /// Same as [`Self::touch_activity_op`], also counting one unviewed message.
    pub fn record_unviewed_message_op(chat_id: &str, user_id: &str, at: DateTime<Utc>) -> TransactOp {
        let update = Update::new()
            .add(ChatMember::MESSAGES_UNVIEWED_COUNT, 1)
            .set(ChatMember::LAST_MESSAGE_ACTIVITY_AT, timestamp::format(at))
            .set_index(&keys::chat_member_k2(user_id, at));
        ops::update_existing(keys::chat_member_key(chat_id, user_id), update)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;

    fn repo() -> ChatMemberRepository {
        ChatMemberRepository::new(Table::new(InMemoryEngine::new()))
    }

    #[tokio::test]
    async fn test_new_member_has_no_unviewed_counter() {
        let repo = repo();
        repo.add(ChatMember::new("c1", "u1")).await.unwrap();

        let item = repo
            .table
            .get_item(&keys::chat_member_key("c1", "u1"))
            .await
            .unwrap()
            .unwrap();

        assert!(!item.contains_key(ChatMember::MESSAGES_UNVIEWED_COUNT));
    }

    #[tokio::test]
    async fn test_increment_twice_then_clear() {
        let repo = repo();
        repo.add(ChatMember::new("c1", "u1")).await.unwrap();

        repo.increment_messages_unviewed_count("c1", "u1").await.unwrap();
        let member = repo.increment_messages_unviewed_count("c1", "u1").await.unwrap();
        assert_eq!(member.messages_unviewed_count, Some(2));

        let member = repo.clear_messages_unviewed_count("c1", "u1").await.unwrap();
        assert_eq!(member.messages_unviewed_count, Some(0));
    }

    #[tokio::test]
    async fn test_increment_missing_member_is_not_found() {
        let result = repo().increment_messages_unviewed_count("c1", "u1").await;
        assert!(matches!(
            result,
            Err(RepositoryError::NotFound { entity_type: "ChatMember", .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_at_skips_when_activity_moved() {
        let repo = repo();
        let member = repo.add(ChatMember::new("c1", "u1")).await.unwrap();
        let seen_at = member.last_message_activity_at;

        repo.table
            .transact(&[ChatMemberRepository::record_unviewed_message_op(
                "c1",
                "u1",
                seen_at + Duration::seconds(5),
            )])
            .await
            .unwrap();

        let cleared = repo
            .clear_messages_unviewed_count_at("c1", "u1", seen_at)
            .await
            .unwrap();

        assert!(cleared.is_none());
        let member = repo.get("c1", "u1").await.unwrap().unwrap();
        assert_eq!(member.unviewed(), 1);
    }

    #[tokio::test]
    async fn test_generate_by_user_most_recent_first() {
        let repo = repo();
        let first = repo.add(ChatMember::new("c1", "u1")).await.unwrap();
        repo.add(ChatMember::new("c2", "u1")).await.unwrap();
        repo.table
            .transact(&[ChatMemberRepository::touch_activity_op(
                "c1",
                "u1",
                first.last_message_activity_at + Duration::minutes(10),
            )])
            .await
            .unwrap();

        let members = collect_all(repo.generate_by_user("u1")).await.unwrap();
        let chats: Vec<_> = members.iter().map(|m| m.chat_id.as_str()).collect();

        assert_eq!(chats, vec!["c1", "c2"]);
    }
}
