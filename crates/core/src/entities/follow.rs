use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::keys::{self, IndexKey, Key, KeyPrefix};
use crate::storage::RepositoryError;
use crate::timestamp;

/// State of a follow relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowStatus {
    Requested,
    Following,
    Denied,
}

impl FollowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowStatus::Requested => "REQUESTED",
            FollowStatus::Following => "FOLLOWING",
            FollowStatus::Denied => "DENIED",
        }
    }

    /// `Following` is left only by deleting the relationship.
    pub fn can_transition_to(&self, next: FollowStatus) -> bool {
        matches!(
            (self, next),
            (FollowStatus::Requested, FollowStatus::Following | FollowStatus::Denied)
                | (FollowStatus::Denied, FollowStatus::Following)
        )
    }
}

/// `follower_user_id` follows (or asked to follow) `followed_user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Follower {
    pub followed_user_id: String,
    pub follower_user_id: String,
    pub follow_status: FollowStatus,
    #[serde(with = "crate::timestamp::required")]
    pub followed_at: DateTime<Utc>,
}

impl Follower {
    pub const FOLLOW_STATUS: &'static str = "followStatus";

    pub fn new(
        follower_user_id: impl Into<String>,
        followed_user_id: impl Into<String>,
        follow_status: FollowStatus,
    ) -> Self {
        Self {
            followed_user_id: followed_user_id.into(),
            follower_user_id: follower_user_id.into(),
            follow_status,
            followed_at: timestamp::now(),
        }
    }

    /// Index keys that depend on the status.
    pub fn status_index_keys(&self, status: FollowStatus) -> Vec<IndexKey> {
        vec![
            keys::follower_a1(&self.follower_user_id, status, self.followed_at),
            keys::follower_a2(&self.followed_user_id, status, self.followed_at),
        ]
    }
}

impl Entity for Follower {
    const ENTITY_TYPE: &'static str = "Follower";

    fn key(&self) -> Key {
        keys::follower_key(&self.followed_user_id, &self.follower_user_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        self.status_index_keys(self.follow_status)
    }

    fn already_exists(&self) -> RepositoryError {
        RepositoryError::AlreadyFollowing {
            follower_user_id: self.follower_user_id.clone(),
            followed_user_id: self.followed_user_id.clone(),
        }
    }

    fn not_found(key: &Key) -> RepositoryError {
        RepositoryError::NotFollowing {
            follower_user_id: keys::strip_prefix(&key.sort_key, KeyPrefix::Follower)
                .unwrap_or_default()
                .to_string(),
            followed_user_id: keys::strip_prefix(&key.partition_key, KeyPrefix::User)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// A post in a user's feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub feed_user_id: String,
    pub post_id: String,
    pub posted_by_user_id: String,
    #[serde(with = "crate::timestamp::required")]
    pub posted_at: DateTime<Utc>,
}

impl Feed {
    pub fn new(
        feed_user_id: impl Into<String>,
        post_id: impl Into<String>,
        posted_by_user_id: impl Into<String>,
        posted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_user_id: feed_user_id.into(),
            post_id: post_id.into(),
            posted_by_user_id: posted_by_user_id.into(),
            posted_at,
        }
    }
}

impl Entity for Feed {
    const ENTITY_TYPE: &'static str = "Feed";

    fn key(&self) -> Key {
        keys::feed_key(&self.feed_user_id, &self.post_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![
            keys::feed_a1(&self.feed_user_id, self.posted_at),
            keys::feed_k2(&self.feed_user_id, &self.posted_by_user_id, self.posted_at),
        ]
    }
}

/// The first unviewed story of a followed user, cached per follower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstStory {
    pub posted_by_user_id: String,
    pub follower_user_id: String,
    pub post_id: String,
    #[serde(with = "crate::timestamp::required")]
    pub expires_at: DateTime<Utc>,
}

impl FirstStory {
    pub fn new(
        posted_by_user_id: impl Into<String>,
        follower_user_id: impl Into<String>,
        post_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            posted_by_user_id: posted_by_user_id.into(),
            follower_user_id: follower_user_id.into(),
            post_id: post_id.into(),
            expires_at,
        }
    }
}

impl Entity for FirstStory {
    const ENTITY_TYPE: &'static str = "FirstStory";

    fn key(&self) -> Key {
        keys::first_story_key(&self.posted_by_user_id, &self.follower_user_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![keys::first_story_a1(&self.follower_user_id, self.expires_at)]
    }
}
