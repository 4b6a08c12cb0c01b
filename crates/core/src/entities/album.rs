use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;
use crate::keys::{self, IndexKey, Key};
use crate::timestamp;

/// A user's album. Posts inside it are ordered by their rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub album_id: String,
    pub owned_by_user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "crate::timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub post_count: i64,
    /// Bumped on every rank assignment so readers can detect reordering.
    #[serde(default)]
    pub rank_count: i64,
}

impl Album {
    pub const POST_COUNT: &'static str = "postCount";
    pub const RANK_COUNT: &'static str = "rankCount";

    pub fn new(owned_by_user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            album_id: Uuid::new_v4().to_string(),
            owned_by_user_id: owned_by_user_id.into(),
            name: name.into(),
            description: None,
            created_at: timestamp::now(),
            post_count: 0,
            rank_count: 0,
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, album_id: impl Into<String>) -> Self {
        self.album_id = album_id.into();
        self
    }
}

impl Entity for Album {
    const ENTITY_TYPE: &'static str = "Album";

    fn key(&self) -> Key {
        keys::album_key(&self.album_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![keys::album_k1(&self.owned_by_user_id, self.created_at)]
    }
}
