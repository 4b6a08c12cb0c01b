use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;
use crate::keys::{self, IndexKey, Key};
use crate::timestamp;

/// A notification card shown to a user, optionally about a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub card_id: String,
    pub user_id: String,
    pub title: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(with = "crate::timestamp::required")]
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            card_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            action: action.into(),
            post_id: None,
            created_at: timestamp::now(),
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, card_id: impl Into<String>) -> Self {
        self.card_id = card_id.into();
        self
    }

    pub fn for_post(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = Some(post_id.into());
        self
    }
}

impl Entity for Card {
    const ENTITY_TYPE: &'static str = "Card";

    fn key(&self) -> Key {
        keys::card_key(&self.card_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        let mut indexes = vec![keys::card_a1(&self.user_id, self.created_at)];
        if let Some(post_id) = &self.post_id {
            indexes.push(keys::card_k1(post_id, &self.user_id));
        }
        indexes
    }
}
