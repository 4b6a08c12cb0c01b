use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Entity;
use crate::item::{AttributeValue, Item, ItemError};
use crate::keys::{self, IndexKey, ItemKind, ItemRef, Key, KeyPrefix};
use crate::storage::RepositoryError;
use crate::timestamp;

// ============================================================================
// Comment
// ============================================================================

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: String,
    pub post_id: String,
    pub user_id: String,
    pub text: String,
    #[serde(with = "crate::timestamp::required")]
    pub commented_at: DateTime<Utc>,
    #[serde(default)]
    pub flag_count: i64,
}

impl Comment {
    pub const FLAG_COUNT: &'static str = "flagCount";

    pub fn new(post_id: impl Into<String>, user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            comment_id: Uuid::new_v4().to_string(),
            post_id: post_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            commented_at: timestamp::now(),
            flag_count: 0,
        }
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, comment_id: impl Into<String>) -> Self {
        self.comment_id = comment_id.into();
        self
    }
}

impl Entity for Comment {
    const ENTITY_TYPE: &'static str = "Comment";

    fn key(&self) -> Key {
        keys::comment_key(&self.comment_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![
            keys::comment_a1(&self.post_id, self.commented_at),
            keys::comment_a2(&self.user_id, self.commented_at),
        ]
    }
}

// ============================================================================
// Like
// ============================================================================

/// Whether the liker is shown to the post owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LikeStatus {
    Onymous,
    Anonymous,
}

impl LikeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeStatus::Onymous => "ONYMOUS",
            LikeStatus::Anonymous => "ANONYMOUS",
        }
    }

    /// The post counter this kind of like is mirrored to.
    pub fn post_counter(&self) -> &'static str {
        match self {
            LikeStatus::Onymous => super::Post::ONYMOUS_LIKE_COUNT,
            LikeStatus::Anonymous => super::Post::ANONYMOUS_LIKE_COUNT,
        }
    }
}

/// A like of a post by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub liked_by_user_id: String,
    pub post_id: String,
    pub posted_by_user_id: String,
    pub like_status: LikeStatus,
    #[serde(with = "crate::timestamp::required")]
    pub liked_at: DateTime<Utc>,
}

impl Like {
    pub fn new(
        liked_by_user_id: impl Into<String>,
        post_id: impl Into<String>,
        posted_by_user_id: impl Into<String>,
        like_status: LikeStatus,
    ) -> Self {
        Self {
            liked_by_user_id: liked_by_user_id.into(),
            post_id: post_id.into(),
            posted_by_user_id: posted_by_user_id.into(),
            like_status,
            liked_at: timestamp::now(),
        }
    }
}

impl Entity for Like {
    const ENTITY_TYPE: &'static str = "Like";

    fn key(&self) -> Key {
        keys::like_key(&self.liked_by_user_id, &self.post_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![
            keys::like_a1(&self.liked_by_user_id, self.like_status, self.liked_at),
            keys::like_a2(&self.post_id, self.like_status, self.liked_at),
            keys::like_k2(&self.posted_by_user_id, &self.liked_by_user_id),
        ]
    }

    fn already_exists(&self) -> RepositoryError {
        RepositoryError::AlreadyLiked {
            post_id: self.post_id.clone(),
            user_id: self.liked_by_user_id.clone(),
        }
    }

    fn not_found(key: &Key) -> RepositoryError {
        let ids = keys::strip_prefix(&key.partition_key, KeyPrefix::Like).unwrap_or_default();
        let (user_id, post_id) = ids.split_once('/').unwrap_or((ids, ""));
        RepositoryError::NotLiked {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

// ============================================================================
// Flag
// ============================================================================

/// A user's flag on an item. Lives in the flagged item's partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub item_kind: ItemKind,
    pub item_id: String,
    pub user_id: String,
    #[serde(with = "crate::timestamp::required")]
    pub created_at: DateTime<Utc>,
}

impl Flag {
    pub fn new(item: &ItemRef, user_id: impl Into<String>) -> Self {
        Self {
            item_kind: item.kind,
            item_id: item.id.clone(),
            user_id: user_id.into(),
            created_at: timestamp::now(),
        }
    }

    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.item_kind, self.item_id.clone())
    }
}

impl Entity for Flag {
    const ENTITY_TYPE: &'static str = "Flag";

    fn key(&self) -> Key {
        keys::flag_key(&self.item(), &self.user_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![keys::flag_k1(&self.user_id, self.item_kind, self.created_at)]
    }

    fn already_exists(&self) -> RepositoryError {
        RepositoryError::AlreadyFlagged {
            item: self.item().to_string(),
            user_id: self.user_id.clone(),
        }
    }

    fn not_found(key: &Key) -> RepositoryError {
        RepositoryError::NotFlagged {
            item: key.partition_key.clone(),
            user_id: keys::strip_prefix(&key.sort_key, KeyPrefix::Flag)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

// ============================================================================
// View
// ============================================================================

/// A user's views of an item: first and last view plus a running count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub item_kind: ItemKind,
    pub item_id: String,
    pub user_id: String,
    #[serde(with = "crate::timestamp::required")]
    pub first_viewed_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp::required")]
    pub last_viewed_at: DateTime<Utc>,
    pub view_count: i64,
}

impl View {
    pub const VIEW_COUNT: &'static str = "viewCount";
    pub const FIRST_VIEWED_AT: &'static str = "firstViewedAt";
    pub const LAST_VIEWED_AT: &'static str = "lastViewedAt";

    pub fn new(item: &ItemRef, user_id: impl Into<String>, view_count: i64, viewed_at: DateTime<Utc>) -> Self {
        Self {
            item_kind: item.kind,
            item_id: item.id.clone(),
            user_id: user_id.into(),
            first_viewed_at: viewed_at,
            last_viewed_at: viewed_at,
            view_count,
        }
    }

    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.item_kind, self.item_id.clone())
    }
}

impl Entity for View {
    const ENTITY_TYPE: &'static str = "View";

    /// Version 1 added `firstViewedAt` and `viewCount`.
    const SCHEMA_VERSION: i64 = 1;

    fn key(&self) -> Key {
        keys::view_key(&self.item(), &self.user_id)
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![
            keys::view_k1(&self.item(), self.first_viewed_at),
            keys::view_a1(&self.user_id, self.item_kind, self.last_viewed_at),
        ]
    }

    fn upgrade(from_version: i64, item: &mut Item) -> Result<(), ItemError> {
        if from_version < 1 {
            if !item.contains_key(Self::FIRST_VIEWED_AT) {
                let last = item
                    .get(Self::LAST_VIEWED_AT)
                    .cloned()
                    .ok_or_else(|| ItemError::Serialization("view has no lastViewedAt".to_string()))?;
                item.insert(Self::FIRST_VIEWED_AT.to_string(), last);
            }
            item.entry(Self::VIEW_COUNT.to_string())
                .or_insert_with(|| AttributeValue::number(1));
        }
        Ok(())
    }

    fn already_exists(&self) -> RepositoryError {
        RepositoryError::ViewAlreadyExists {
            item: self.item().to_string(),
            user_id: self.user_id.clone(),
        }
    }

    fn not_found(key: &Key) -> RepositoryError {
        RepositoryError::ViewDoesNotExist {
            item: key.partition_key.clone(),
            user_id: keys::strip_prefix(&key.sort_key, KeyPrefix::View)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_errors_name_item_and_user() {
        let flag = Flag::new(&ItemRef::post("p1"), "u1");
        assert_eq!(
            flag.already_exists(),
            RepositoryError::AlreadyFlagged {
                item: "post/p1".to_string(),
                user_id: "u1".to_string(),
            }
        );
        assert_eq!(
            Flag::not_found(&flag.key()),
            RepositoryError::NotFlagged {
                item: "post/p1".to_string(),
                user_id: "u1".to_string(),
            }
        );
    }

    #[test]
    fn test_like_not_found_parses_key() {
        let key = keys::like_key("u1", "p1");
        assert_eq!(
            Like::not_found(&key),
            RepositoryError::NotLiked {
                post_id: "p1".to_string(),
                user_id: "u1".to_string(),
            }
        );
    }

    #[test]
    fn test_view_upgrade_from_version_zero() {
        let view = View::new(&ItemRef::chat("c1"), "u1", 3, timestamp::now());
        let mut item = view.to_item().unwrap();
        item.remove(View::FIRST_VIEWED_AT);
        item.remove(View::VIEW_COUNT);

        View::upgrade(0, &mut item).unwrap();
        let upgraded = View::from_item(&item).unwrap();

        assert_eq!(upgraded.first_viewed_at, view.last_viewed_at);
        assert_eq!(upgraded.view_count, 1);
    }

    #[test]
    fn test_like_status_maps_to_post_counter() {
        assert_eq!(LikeStatus::Onymous.post_counter(), "onymousLikeCount");
        assert_eq!(LikeStatus::Anonymous.post_counter(), "anonymousLikeCount");
    }
}
