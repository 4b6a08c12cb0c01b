use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;
use crate::keys::{self, IndexKey, Key};
use crate::timestamp;

/// Lifecycle of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Pending,
    Processing,
    Completed,
    Archived,
    Error,
    Deleting,
}

impl PostStatus {
    pub const ALL: [PostStatus; 6] = [
        PostStatus::Pending,
        PostStatus::Processing,
        PostStatus::Completed,
        PostStatus::Archived,
        PostStatus::Error,
        PostStatus::Deleting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "PENDING",
            PostStatus::Processing => "PROCESSING",
            PostStatus::Completed => "COMPLETED",
            PostStatus::Archived => "ARCHIVED",
            PostStatus::Error => "ERROR",
            PostStatus::Deleting => "DELETING",
        }
    }

    /// Whether a post may move from this status to `next`.
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        use PostStatus::*;
        match (self, next) {
            (Deleting, _) => false,
            (_, Deleting) => true,
            (Pending, Processing | Completed | Error) => true,
            (Processing, Completed | Error) => true,
            (Completed, Archived) => true,
            (Archived, Completed) => true,
            (Error, Pending) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostType {
    Image,
    Video,
    TextOnly,
}

/// A post. Optionally expires (stories) and optionally belongs to an album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub post_id: String,
    pub posted_by_user_id: String,
    pub post_type: PostType,
    pub post_status: PostStatus,
    #[serde(with = "crate::timestamp::required")]
    pub posted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::timestamp::optional")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_rank: Option<String>,
    #[serde(default)]
    pub onymous_like_count: i64,
    #[serde(default)]
    pub anonymous_like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub flag_count: i64,
    #[serde(default)]
    pub viewed_by_count: i64,
}

impl Post {
    pub const POST_STATUS: &'static str = "postStatus";
    pub const ALBUM_ID: &'static str = "albumId";
    pub const ALBUM_RANK: &'static str = "albumRank";
    pub const ONYMOUS_LIKE_COUNT: &'static str = "onymousLikeCount";
    pub const ANONYMOUS_LIKE_COUNT: &'static str = "anonymousLikeCount";
    pub const COMMENT_COUNT: &'static str = "commentCount";
    pub const FLAG_COUNT: &'static str = "flagCount";
    pub const VIEWED_BY_COUNT: &'static str = "viewedByCount";

    pub fn new(posted_by_user_id: impl Into<String>, post_type: PostType) -> Self {
        Self {
            post_id: Uuid::new_v4().to_string(),
            posted_by_user_id: posted_by_user_id.into(),
            post_type,
            post_status: PostStatus::Pending,
            posted_at: timestamp::now(),
            expires_at: None,
            text: None,
            album_id: None,
            album_rank: None,
            onymous_like_count: 0,
            anonymous_like_count: 0,
            comment_count: 0,
            flag_count: 0,
            viewed_by_count: 0,
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = post_id.into();
        self
    }

    pub fn with_posted_at(mut self, posted_at: DateTime<Utc>) -> Self {
        self.posted_at = posted_at;
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.post_status = status;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Index keys that depend on the status, for status transitions.
    pub fn status_index_keys(&self, status: PostStatus) -> Vec<IndexKey> {
        let mut indexes = vec![keys::post_a2(&self.posted_by_user_id, status, self.posted_at)];
        if let Some(expires_at) = self.expires_at {
            indexes.push(keys::post_a1(&self.posted_by_user_id, status, expires_at));
        }
        indexes
    }

    pub fn like_count(&self) -> i64 {
        self.onymous_like_count + self.anonymous_like_count
    }
}

impl Entity for Post {
    const ENTITY_TYPE: &'static str = "Post";

    fn key(&self) -> Key {
        keys::post_key(&self.post_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        let mut indexes = self.status_index_keys(self.post_status);
        if let (Some(album_id), Some(rank)) = (&self.album_id, &self.album_rank) {
            indexes.push(keys::post_a3(album_id, rank));
        }
        indexes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use PostStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Error));
        assert!(Completed.can_transition_to(Archived));
        assert!(Archived.can_transition_to(Completed));
        assert!(Error.can_transition_to(Pending));

        assert!(!Completed.can_transition_to(Pending));
        assert!(!Archived.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Archived));
    }

    #[test]
    fn test_anything_but_deleting_can_be_deleted() {
        for status in PostStatus::ALL {
            let expected = status != PostStatus::Deleting;
            assert_eq!(status.can_transition_to(PostStatus::Deleting), expected);
            assert!(!PostStatus::Deleting.can_transition_to(status));
        }
    }

    #[test]
    fn test_status_serializes_like_key_segment() {
        let json = serde_json::to_value(PostStatus::Completed).unwrap();
        assert_eq!(json, PostStatus::Completed.as_str());
    }

    #[test]
    fn test_album_post_populates_a3() {
        let mut post = Post::new("u1", PostType::Image).with_id("p1");
        post.album_id = Some("a1".to_string());
        post.album_rank = Some("V".to_string());

        let slots: Vec<_> = post.index_keys().iter().map(|k| k.slot).collect();
        assert!(slots.contains(&keys::IndexSlot::A3));
    }

    #[test]
    fn test_story_populates_a1() {
        let post = Post::new("u1", PostType::Image).with_expires_at(timestamp::now());
        assert_eq!(post.status_index_keys(PostStatus::Pending).len(), 2);
    }
}
