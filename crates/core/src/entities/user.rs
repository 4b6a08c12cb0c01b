use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;
use crate::keys::{self, IndexKey, Key};
use crate::timestamp;

/// A user profile. Owns the per-user totals kept by relationship writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(with = "crate::timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub follower_count: i64,
    #[serde(default)]
    pub followed_count: i64,
    #[serde(default)]
    pub post_count: i64,
    #[serde(default)]
    pub card_count: i64,
    #[serde(default)]
    pub chat_count: i64,
    #[serde(default)]
    pub chats_with_unviewed_messages_count: i64,
}

impl User {
    pub const FOLLOWER_COUNT: &'static str = "followerCount";
    pub const FOLLOWED_COUNT: &'static str = "followedCount";
    pub const POST_COUNT: &'static str = "postCount";
    pub const CARD_COUNT: &'static str = "cardCount";
    pub const CHAT_COUNT: &'static str = "chatCount";
    pub const CHATS_WITH_UNVIEWED_MESSAGES_COUNT: &'static str = "chatsWithUnviewedMessagesCount";

    pub fn new(username: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::new_v4().to_string(),
            username: username.into(),
            full_name: None,
            created_at: timestamp::now(),
            follower_count: 0,
            followed_count: 0,
            post_count: 0,
            card_count: 0,
            chat_count: 0,
            chats_with_unviewed_messages_count: 0,
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }
}

impl Entity for User {
    const ENTITY_TYPE: &'static str = "User";

    fn key(&self) -> Key {
        keys::user_key(&self.user_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![keys::user_a1(&self.username)]
    }
}
