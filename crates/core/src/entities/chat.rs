use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;
use crate::keys::{self, IndexKey, Key};
use crate::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatType {
    Direct,
    Group,
}

/// A chat between users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub chat_id: String,
    pub chat_type: ChatType,
    pub created_by_user_id: String,
    /// The other participant of a direct chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(with = "crate::timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp::required")]
    pub last_message_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub messages_count: i64,
    #[serde(default)]
    pub user_count: i64,
    #[serde(default)]
    pub flag_count: i64,
}

impl Chat {
    pub const MESSAGES_COUNT: &'static str = "messagesCount";
    pub const USER_COUNT: &'static str = "userCount";
    pub const FLAG_COUNT: &'static str = "flagCount";
    pub const LAST_MESSAGE_ACTIVITY_AT: &'static str = "lastMessageActivityAt";

    pub fn direct(created_by_user_id: impl Into<String>, with_user_id: impl Into<String>) -> Self {
        let now = timestamp::now();
        Self {
            chat_id: Uuid::new_v4().to_string(),
            chat_type: ChatType::Direct,
            created_by_user_id: created_by_user_id.into(),
            with_user_id: Some(with_user_id.into()),
            name: None,
            created_at: now,
            last_message_activity_at: now,
            messages_count: 0,
            user_count: 0,
            flag_count: 0,
        }
    }

    pub fn group(created_by_user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = timestamp::now();
        Self {
            chat_id: Uuid::new_v4().to_string(),
            chat_type: ChatType::Group,
            created_by_user_id: created_by_user_id.into(),
            with_user_id: None,
            name: Some(name.into()),
            created_at: now,
            last_message_activity_at: now,
            messages_count: 0,
            user_count: 0,
            flag_count: 0,
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = chat_id.into();
        self
    }
}

impl Entity for Chat {
    const ENTITY_TYPE: &'static str = "Chat";

    fn key(&self) -> Key {
        keys::chat_key(&self.chat_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        match (self.chat_type, &self.with_user_id) {
            (ChatType::Direct, Some(with_user_id)) => {
                vec![keys::chat_direct_a1(&self.created_by_user_id, with_user_id)]
            }
            _ => Vec::new(),
        }
    }
}

/// Membership of a user in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMember {
    pub chat_id: String,
    pub user_id: String,
    #[serde(with = "crate::timestamp::required")]
    pub joined_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp::required")]
    pub last_message_activity_at: DateTime<Utc>,
    /// Absent until the first message arrives after the member's last view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_unviewed_count: Option<i64>,
}

impl ChatMember {
    pub const MESSAGES_UNVIEWED_COUNT: &'static str = "messagesUnviewedCount";
    pub const LAST_MESSAGE_ACTIVITY_AT: &'static str = "lastMessageActivityAt";

    pub fn new(chat_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = timestamp::now();
        Self {
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            joined_at: now,
            last_message_activity_at: now,
            messages_unviewed_count: None,
        }
    }

    pub fn with_joined_at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.joined_at = joined_at;
        self.last_message_activity_at = joined_at;
        self
    }

    pub fn unviewed(&self) -> i64 {
        self.messages_unviewed_count.unwrap_or(0)
    }
}

impl Entity for ChatMember {
    const ENTITY_TYPE: &'static str = "ChatMember";

    fn key(&self) -> Key {
        keys::chat_member_key(&self.chat_id, &self.user_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![
            keys::chat_member_k1(&self.chat_id, self.joined_at),
            keys::chat_member_k2(&self.user_id, self.last_message_activity_at),
        ]
    }
}

/// A message in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message_id: String,
    pub chat_id: String,
    pub user_id: String,
    pub text: String,
    #[serde(with = "crate::timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::timestamp::optional")]
    pub last_edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flag_count: i64,
}

impl ChatMessage {
    pub const TEXT: &'static str = "text";
    pub const LAST_EDITED_AT: &'static str = "lastEditedAt";
    pub const FLAG_COUNT: &'static str = "flagCount";

    pub fn new(chat_id: impl Into<String>, user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            created_at: timestamp::now(),
            last_edited_at: None,
            flag_count: 0,
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

impl Entity for ChatMessage {
    const ENTITY_TYPE: &'static str = "ChatMessage";

    fn key(&self) -> Key {
        keys::chat_message_key(&self.message_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![keys::chat_message_a1(&self.chat_id, self.created_at)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_chat_index_ignores_participant_order() {
        let one = Chat::direct("u1", "u2");
        let other = Chat::direct("u2", "u1");
        assert_eq!(one.index_keys(), other.index_keys());
    }

    #[test]
    fn test_group_chat_has_no_direct_index() {
        assert!(Chat::group("u1", "friends").index_keys().is_empty());
    }

    #[test]
    fn test_new_member_has_no_unviewed_count() {
        let member = ChatMember::new("c1", "u1");
        let item = member.to_item().unwrap();
        assert!(!item.contains_key(ChatMember::MESSAGES_UNVIEWED_COUNT));
        assert_eq!(member.unviewed(), 0);
    }
}
