//! Key schema for the single-table layout.
//!
//! Pure functions for generating partition and sort keys (primary and index
//! slots) for every entity type. Prefixes come from [`KeyPrefix`]; no other
//! module builds key strings by hand.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{FollowStatus, LikeStatus, PostStatus};
use crate::item::{AttributeValue, Item};
use crate::timestamp;

// ============================================================================
// Attribute names
// ============================================================================

pub const PARTITION_KEY: &str = "partitionKey";
pub const SORT_KEY: &str = "sortKey";
pub const SCHEMA_VERSION: &str = "schemaVersion";

/// Sort key (or index sort key) for items that are alone in their partition.
pub const EMPTY_SORT_KEY: &str = "-";

const SEPARATOR: &str = "/";

// ============================================================================
// Key prefixes
// ============================================================================

/// Every key prefix in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPrefix {
    User,
    Username,
    Profile,
    Post,
    Album,
    Chat,
    Member,
    ChatMessage,
    Comment,
    Like,
    Flag,
    View,
    Follower,
    Followed,
    Feed,
    FirstStory,
    Card,
    Trending,
}

impl KeyPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPrefix::User => "user",
            KeyPrefix::Username => "username",
            KeyPrefix::Profile => "profile",
            KeyPrefix::Post => "post",
            KeyPrefix::Album => "album",
            KeyPrefix::Chat => "chat",
            KeyPrefix::Member => "member",
            KeyPrefix::ChatMessage => "chatMessage",
            KeyPrefix::Comment => "comment",
            KeyPrefix::Like => "like",
            KeyPrefix::Flag => "flag",
            KeyPrefix::View => "view",
            KeyPrefix::Follower => "follower",
            KeyPrefix::Followed => "followed",
            KeyPrefix::Feed => "feed",
            KeyPrefix::FirstStory => "firstStory",
            KeyPrefix::Card => "card",
            KeyPrefix::Trending => "trending",
        }
    }

    /// The prefix followed by the separator, for `begins_with` conditions.
    pub fn begins_with(&self) -> String {
        format!("{}{SEPARATOR}", self.as_str())
    }
}

/// The rest of a key component after `prefix/`.
pub fn strip_prefix(value: &str, prefix: KeyPrefix) -> Option<&str> {
    value
        .strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
}

/// Joins a prefix and key segments with the separator.
fn compose(prefix: KeyPrefix, parts: &[&str]) -> String {
    let mut key = prefix.as_str().to_string();
    for part in parts {
        key.push_str(SEPARATOR);
        key.push_str(part);
    }
    key
}

/// Joins free segments (used for status/timestamp index sort keys).
fn join(parts: &[&str]) -> String {
    parts.join(SEPARATOR)
}

// ============================================================================
// Key types
// ============================================================================

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub partition_key: String,
    pub sort_key: String,
}

impl Key {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }

    /// The key as item attributes.
    pub fn to_item(&self) -> Item {
        let mut item = Item::with_capacity(2);
        item.insert(PARTITION_KEY.to_string(), AttributeValue::S(self.partition_key.clone()));
        item.insert(SORT_KEY.to_string(), AttributeValue::S(self.sort_key.clone()));
        item
    }

    /// Extracts the primary key from an item, if it carries one.
    pub fn from_item(item: &Item) -> Option<Self> {
        let partition_key = item.get(PARTITION_KEY)?.as_s()?;
        let sort_key = item.get(SORT_KEY)?.as_s()?;
        Some(Self::new(partition_key, sort_key))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.partition_key, self.sort_key)
    }
}

/// A secondary index slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexSlot {
    A1,
    A2,
    A3,
    A4,
    K1,
    K2,
    K3,
}

impl IndexSlot {
    pub const ALL: [IndexSlot; 7] = [
        IndexSlot::A1,
        IndexSlot::A2,
        IndexSlot::A3,
        IndexSlot::A4,
        IndexSlot::K1,
        IndexSlot::K2,
        IndexSlot::K3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexSlot::A1 => "A1",
            IndexSlot::A2 => "A2",
            IndexSlot::A3 => "A3",
            IndexSlot::A4 => "A4",
            IndexSlot::K1 => "K1",
            IndexSlot::K2 => "K2",
            IndexSlot::K3 => "K3",
        }
    }

    /// Name of the index in the store.
    pub fn index_name(&self) -> &'static str {
        match self {
            IndexSlot::A1 => "GSI-A1",
            IndexSlot::A2 => "GSI-A2",
            IndexSlot::A3 => "GSI-A3",
            IndexSlot::A4 => "GSI-A4",
            IndexSlot::K1 => "GSI-K1",
            IndexSlot::K2 => "GSI-K2",
            IndexSlot::K3 => "GSI-K3",
        }
    }

    pub fn partition_key_attr(&self) -> &'static str {
        match self {
            IndexSlot::A1 => "gsiA1PartitionKey",
            IndexSlot::A2 => "gsiA2PartitionKey",
            IndexSlot::A3 => "gsiA3PartitionKey",
            IndexSlot::A4 => "gsiA4PartitionKey",
            IndexSlot::K1 => "gsiK1PartitionKey",
            IndexSlot::K2 => "gsiK2PartitionKey",
            IndexSlot::K3 => "gsiK3PartitionKey",
        }
    }

    pub fn sort_key_attr(&self) -> &'static str {
        match self {
            IndexSlot::A1 => "gsiA1SortKey",
            IndexSlot::A2 => "gsiA2SortKey",
            IndexSlot::A3 => "gsiA3SortKey",
            IndexSlot::A4 => "gsiA4SortKey",
            IndexSlot::K1 => "gsiK1SortKey",
            IndexSlot::K2 => "gsiK2SortKey",
            IndexSlot::K3 => "gsiK3SortKey",
        }
    }

    /// Whether the index sort key holds numbers rather than strings.
    pub fn numeric_sort_key(&self) -> bool {
        matches!(self, IndexSlot::K3)
    }
}

/// The key of an item in one index slot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexKey {
    pub slot: IndexSlot,
    pub partition_key: String,
    pub sort_key: AttributeValue,
}

impl IndexKey {
    fn new(slot: IndexSlot, partition_key: String, sort_key: impl Into<AttributeValue>) -> Self {
        Self {
            slot,
            partition_key,
            sort_key: sort_key.into(),
        }
    }

    /// Writes the slot attributes onto an item.
    pub fn apply(&self, item: &mut Item) {
        item.insert(
            self.slot.partition_key_attr().to_string(),
            AttributeValue::S(self.partition_key.clone()),
        );
        item.insert(self.slot.sort_key_attr().to_string(), self.sort_key.clone());
    }
}

// ============================================================================
// Item references (targets of views, flags and trending scores)
// ============================================================================

/// Entity kinds that can be viewed, flagged or trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Post,
    Comment,
    Chat,
    ChatMessage,
    User,
}

impl ItemKind {
    pub fn prefix(&self) -> KeyPrefix {
        match self {
            ItemKind::Post => KeyPrefix::Post,
            ItemKind::Comment => KeyPrefix::Comment,
            ItemKind::Chat => KeyPrefix::Chat,
            ItemKind::ChatMessage => KeyPrefix::ChatMessage,
            ItemKind::User => KeyPrefix::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.prefix().as_str()
    }
}

/// A reference to a viewable/flaggable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: String,
}

impl ItemRef {
    pub fn new(kind: ItemKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn post(id: impl Into<String>) -> Self {
        Self::new(ItemKind::Post, id)
    }

    pub fn chat(id: impl Into<String>) -> Self {
        Self::new(ItemKind::Chat, id)
    }

    pub fn chat_message(id: impl Into<String>) -> Self {
        Self::new(ItemKind::ChatMessage, id)
    }

    pub fn comment(id: impl Into<String>) -> Self {
        Self::new(ItemKind::Comment, id)
    }

    /// The partition shared by the item and its relationship rows.
    pub fn partition_key(&self) -> String {
        compose(self.kind.prefix(), &[&self.id])
    }

    /// Primary key of the referenced item itself.
    pub fn item_key(&self) -> Key {
        match self.kind {
            ItemKind::User => user_key(&self.id),
            _ => Key::new(self.partition_key(), EMPTY_SORT_KEY),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.partition_key())
    }
}

// ============================================================================
// User keys
// ============================================================================

/// Pattern: `user/<user_id>` / `profile`
pub fn user_key(user_id: &str) -> Key {
    Key::new(compose(KeyPrefix::User, &[user_id]), KeyPrefix::Profile.as_str())
}

/// Pattern: `username/<username>` / `-`
pub fn user_a1(username: &str) -> IndexKey {
    IndexKey::new(IndexSlot::A1, compose(KeyPrefix::Username, &[username]), EMPTY_SORT_KEY)
}

/// Partition for username lookups.
pub fn username_partition(username: &str) -> String {
    compose(KeyPrefix::Username, &[username])
}

// ============================================================================
// Post keys
// ============================================================================

/// Pattern: `post/<post_id>` / `-`
pub fn post_key(post_id: &str) -> Key {
    Key::new(compose(KeyPrefix::Post, &[post_id]), EMPTY_SORT_KEY)
}

/// Posts by user, ordered by posting time within a status.
///
/// Pattern: `post/<posted_by_user_id>` / `<status>/<posted_at>`
pub fn post_a2(posted_by_user_id: &str, status: PostStatus, posted_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A2,
        posts_by_user_partition(posted_by_user_id),
        join(&[status.as_str(), &timestamp::format(posted_at)]),
    )
}

/// Expiring posts by user, ordered by expiry within a status.
///
/// Pattern: `post/<posted_by_user_id>` / `<status>/<expires_at>`
pub fn post_a1(posted_by_user_id: &str, status: PostStatus, expires_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        posts_by_user_partition(posted_by_user_id),
        join(&[status.as_str(), &timestamp::format(expires_at)]),
    )
}

/// Posts in an album, ordered by rank.
///
/// Pattern: `post/<album_id>` / `<album_rank>`
pub fn post_a3(album_id: &str, album_rank: &str) -> IndexKey {
    IndexKey::new(IndexSlot::A3, album_posts_partition(album_id), album_rank)
}

pub fn posts_by_user_partition(user_id: &str) -> String {
    compose(KeyPrefix::Post, &[user_id])
}

pub fn album_posts_partition(album_id: &str) -> String {
    compose(KeyPrefix::Post, &[album_id])
}

/// Index sort key prefix selecting one post status.
pub fn post_status_prefix(status: PostStatus) -> String {
    format!("{}{SEPARATOR}", status.as_str())
}

// ============================================================================
// Album keys
// ============================================================================

/// Pattern: `album/<album_id>` / `-`
pub fn album_key(album_id: &str) -> Key {
    Key::new(compose(KeyPrefix::Album, &[album_id]), EMPTY_SORT_KEY)
}

/// Pattern: `album/<owned_by_user_id>` / `<created_at>`
pub fn album_k1(owned_by_user_id: &str, created_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::K1,
        albums_by_user_partition(owned_by_user_id),
        timestamp::format(created_at),
    )
}

pub fn albums_by_user_partition(user_id: &str) -> String {
    compose(KeyPrefix::Album, &[user_id])
}

// ============================================================================
// Chat keys
// ============================================================================

/// Pattern: `chat/<chat_id>` / `-`
pub fn chat_key(chat_id: &str) -> Key {
    Key::new(compose(KeyPrefix::Chat, &[chat_id]), EMPTY_SORT_KEY)
}

/// Direct chat lookup by its two participants, independent of their order.
///
/// Pattern: `chat/<low_user_id>/<high_user_id>` / `-`
pub fn chat_direct_a1(user_id: &str, other_user_id: &str) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        direct_chat_partition(user_id, other_user_id),
        EMPTY_SORT_KEY,
    )
}

pub fn direct_chat_partition(user_id: &str, other_user_id: &str) -> String {
    let (low, high) = if user_id <= other_user_id {
        (user_id, other_user_id)
    } else {
        (other_user_id, user_id)
    };
    compose(KeyPrefix::Chat, &[low, high])
}

// ============================================================================
// Chat member keys
// ============================================================================

/// Pattern: `chat/<chat_id>` / `member/<user_id>`
pub fn chat_member_key(chat_id: &str, user_id: &str) -> Key {
    Key::new(
        compose(KeyPrefix::Chat, &[chat_id]),
        compose(KeyPrefix::Member, &[user_id]),
    )
}

/// Members of a chat ordered by join time.
///
/// Pattern: `chat/<chat_id>` / `member/<joined_at>`
pub fn chat_member_k1(chat_id: &str, joined_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::K1,
        compose(KeyPrefix::Chat, &[chat_id]),
        compose(KeyPrefix::Member, &[&timestamp::format(joined_at)]),
    )
}

/// Chats of a user ordered by last message activity.
///
/// Pattern: `member/<user_id>` / `chat/<last_message_activity_at>`
pub fn chat_member_k2(user_id: &str, last_message_activity_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::K2,
        compose(KeyPrefix::Member, &[user_id]),
        compose(KeyPrefix::Chat, &[&timestamp::format(last_message_activity_at)]),
    )
}

pub fn chat_partition(chat_id: &str) -> String {
    compose(KeyPrefix::Chat, &[chat_id])
}

pub fn member_chats_partition(user_id: &str) -> String {
    compose(KeyPrefix::Member, &[user_id])
}

// ============================================================================
// Chat message keys
// ============================================================================

/// Pattern: `chatMessage/<message_id>` / `-`
pub fn chat_message_key(message_id: &str) -> Key {
    Key::new(compose(KeyPrefix::ChatMessage, &[message_id]), EMPTY_SORT_KEY)
}

/// Messages of a chat ordered by creation.
///
/// Pattern: `chatMessage/<chat_id>` / `<created_at>`
pub fn chat_message_a1(chat_id: &str, created_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        chat_messages_partition(chat_id),
        timestamp::format(created_at),
    )
}

pub fn chat_messages_partition(chat_id: &str) -> String {
    compose(KeyPrefix::ChatMessage, &[chat_id])
}

// ============================================================================
// Comment keys
// ============================================================================

/// Pattern: `comment/<comment_id>` / `-`
pub fn comment_key(comment_id: &str) -> Key {
    Key::new(compose(KeyPrefix::Comment, &[comment_id]), EMPTY_SORT_KEY)
}

/// Pattern: `comment/<post_id>` / `<commented_at>`
pub fn comment_a1(post_id: &str, commented_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        compose(KeyPrefix::Comment, &[post_id]),
        timestamp::format(commented_at),
    )
}

/// Pattern: `comment/<user_id>` / `<commented_at>`
pub fn comment_a2(user_id: &str, commented_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A2,
        compose(KeyPrefix::Comment, &[user_id]),
        timestamp::format(commented_at),
    )
}

pub fn comments_partition(owner_id: &str) -> String {
    compose(KeyPrefix::Comment, &[owner_id])
}

// ============================================================================
// Like keys
// ============================================================================

/// Pattern: `like/<liked_by_user_id>/<post_id>` / `-`
pub fn like_key(liked_by_user_id: &str, post_id: &str) -> Key {
    Key::new(
        compose(KeyPrefix::Like, &[liked_by_user_id, post_id]),
        EMPTY_SORT_KEY,
    )
}

/// Pattern: `like/<liked_by_user_id>` / `<like_status>/<liked_at>`
pub fn like_a1(liked_by_user_id: &str, status: LikeStatus, liked_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        compose(KeyPrefix::Like, &[liked_by_user_id]),
        join(&[status.as_str(), &timestamp::format(liked_at)]),
    )
}

/// Pattern: `like/<post_id>` / `<like_status>/<liked_at>`
pub fn like_a2(post_id: &str, status: LikeStatus, liked_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A2,
        compose(KeyPrefix::Like, &[post_id]),
        join(&[status.as_str(), &timestamp::format(liked_at)]),
    )
}

/// Pattern: `like/<posted_by_user_id>` / `<liked_by_user_id>`
pub fn like_k2(posted_by_user_id: &str, liked_by_user_id: &str) -> IndexKey {
    IndexKey::new(
        IndexSlot::K2,
        compose(KeyPrefix::Like, &[posted_by_user_id]),
        liked_by_user_id,
    )
}

pub fn likes_partition(owner_id: &str) -> String {
    compose(KeyPrefix::Like, &[owner_id])
}

pub fn like_status_prefix(status: LikeStatus) -> String {
    format!("{}{SEPARATOR}", status.as_str())
}

// ============================================================================
// Flag keys
// ============================================================================

/// Pattern: `<item_kind>/<item_id>` / `flag/<user_id>`
pub fn flag_key(item: &ItemRef, user_id: &str) -> Key {
    Key::new(item.partition_key(), compose(KeyPrefix::Flag, &[user_id]))
}

/// Pattern: `flag/<user_id>` / `<item_kind>/<created_at>`
pub fn flag_k1(user_id: &str, kind: ItemKind, created_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::K1,
        flags_by_user_partition(user_id),
        join(&[kind.as_str(), &timestamp::format(created_at)]),
    )
}

pub fn flags_by_user_partition(user_id: &str) -> String {
    compose(KeyPrefix::Flag, &[user_id])
}

// ============================================================================
// View keys
// ============================================================================

/// Pattern: `<item_kind>/<item_id>` / `view/<user_id>`
pub fn view_key(item: &ItemRef, user_id: &str) -> Key {
    Key::new(item.partition_key(), compose(KeyPrefix::View, &[user_id]))
}

/// Viewers of an item ordered by first view.
///
/// Pattern: `<item_kind>/<item_id>` / `view/<first_viewed_at>`
pub fn view_k1(item: &ItemRef, first_viewed_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::K1,
        item.partition_key(),
        compose(KeyPrefix::View, &[&timestamp::format(first_viewed_at)]),
    )
}

/// Items viewed by a user ordered by last view within a kind.
///
/// Pattern: `view/<user_id>` / `<item_kind>/<last_viewed_at>`
pub fn view_a1(user_id: &str, kind: ItemKind, last_viewed_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        views_by_user_partition(user_id),
        join(&[kind.as_str(), &timestamp::format(last_viewed_at)]),
    )
}

pub fn views_by_user_partition(user_id: &str) -> String {
    compose(KeyPrefix::View, &[user_id])
}

/// Index sort key prefix selecting one item kind.
pub fn item_kind_prefix(kind: ItemKind) -> String {
    format!("{}{SEPARATOR}", kind.as_str())
}

// ============================================================================
// Follower keys
// ============================================================================

/// Pattern: `user/<followed_user_id>` / `follower/<follower_user_id>`
pub fn follower_key(followed_user_id: &str, follower_user_id: &str) -> Key {
    Key::new(
        compose(KeyPrefix::User, &[followed_user_id]),
        compose(KeyPrefix::Follower, &[follower_user_id]),
    )
}

/// Users followed by a follower.
///
/// Pattern: `follower/<follower_user_id>` / `<status>/<followed_at>`
pub fn follower_a1(follower_user_id: &str, status: FollowStatus, followed_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        followed_by_partition(follower_user_id),
        join(&[status.as_str(), &timestamp::format(followed_at)]),
    )
}

/// Followers of a followed user.
///
/// Pattern: `followed/<followed_user_id>` / `<status>/<followed_at>`
pub fn follower_a2(followed_user_id: &str, status: FollowStatus, followed_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A2,
        followers_of_partition(followed_user_id),
        join(&[status.as_str(), &timestamp::format(followed_at)]),
    )
}

pub fn followed_by_partition(follower_user_id: &str) -> String {
    compose(KeyPrefix::Follower, &[follower_user_id])
}

pub fn followers_of_partition(followed_user_id: &str) -> String {
    compose(KeyPrefix::Followed, &[followed_user_id])
}

pub fn follow_status_prefix(status: FollowStatus) -> String {
    format!("{}{SEPARATOR}", status.as_str())
}

// ============================================================================
// Feed keys
// ============================================================================

/// Pattern: `user/<feed_user_id>` / `feed/<post_id>`
pub fn feed_key(feed_user_id: &str, post_id: &str) -> Key {
    Key::new(
        compose(KeyPrefix::User, &[feed_user_id]),
        compose(KeyPrefix::Feed, &[post_id]),
    )
}

/// Pattern: `feed/<feed_user_id>` / `<posted_at>`
pub fn feed_a1(feed_user_id: &str, posted_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        feed_partition(feed_user_id),
        timestamp::format(posted_at),
    )
}

/// Pattern: `feed/<feed_user_id>/<posted_by_user_id>` / `<posted_at>`
pub fn feed_k2(feed_user_id: &str, posted_by_user_id: &str, posted_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::K2,
        feed_by_poster_partition(feed_user_id, posted_by_user_id),
        timestamp::format(posted_at),
    )
}

pub fn feed_partition(feed_user_id: &str) -> String {
    compose(KeyPrefix::Feed, &[feed_user_id])
}

pub fn feed_by_poster_partition(feed_user_id: &str, posted_by_user_id: &str) -> String {
    compose(KeyPrefix::Feed, &[feed_user_id, posted_by_user_id])
}

// ============================================================================
// First story keys
// ============================================================================

/// Pattern: `user/<posted_by_user_id>` / `follower/<follower_user_id>/firstStory`
pub fn first_story_key(posted_by_user_id: &str, follower_user_id: &str) -> Key {
    Key::new(
        compose(KeyPrefix::User, &[posted_by_user_id]),
        compose(
            KeyPrefix::Follower,
            &[follower_user_id, KeyPrefix::FirstStory.as_str()],
        ),
    )
}

/// Pattern: `follower/<follower_user_id>/firstStory` / `<expires_at>`
pub fn first_story_a1(follower_user_id: &str, expires_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        first_stories_partition(follower_user_id),
        timestamp::format(expires_at),
    )
}

pub fn first_stories_partition(follower_user_id: &str) -> String {
    compose(
        KeyPrefix::Follower,
        &[follower_user_id, KeyPrefix::FirstStory.as_str()],
    )
}

// ============================================================================
// Card keys
// ============================================================================

/// Pattern: `card/<card_id>` / `-`
pub fn card_key(card_id: &str) -> Key {
    Key::new(compose(KeyPrefix::Card, &[card_id]), EMPTY_SORT_KEY)
}

/// Pattern: `user/<user_id>` / `card/<created_at>`
pub fn card_a1(user_id: &str, created_at: DateTime<Utc>) -> IndexKey {
    IndexKey::new(
        IndexSlot::A1,
        compose(KeyPrefix::User, &[user_id]),
        compose(KeyPrefix::Card, &[&timestamp::format(created_at)]),
    )
}

/// Pattern: `card/<post_id>` / `<user_id>`
pub fn card_k1(post_id: &str, user_id: &str) -> IndexKey {
    IndexKey::new(IndexSlot::K1, post_cards_partition(post_id), user_id)
}

pub fn user_partition(user_id: &str) -> String {
    compose(KeyPrefix::User, &[user_id])
}

pub fn post_cards_partition(post_id: &str) -> String {
    compose(KeyPrefix::Card, &[post_id])
}

// ============================================================================
// Trending keys
// ============================================================================

/// Pattern: `<item_kind>/<item_id>` / `trending`
pub fn trending_key(item: &ItemRef) -> Key {
    Key::new(item.partition_key(), KeyPrefix::Trending.as_str())
}

/// Pattern: `<item_kind>/trending` / `<score>` (numeric)
pub fn trending_k3(kind: ItemKind, score: f64) -> IndexKey {
    IndexKey::new(IndexSlot::K3, trending_partition(kind), AttributeValue::float(score))
}

pub fn trending_partition(kind: ItemKind) -> String {
    compose(kind.prefix(), &[KeyPrefix::Trending.as_str()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_user_key() {
        let key = user_key("u1");
        assert_eq!(key.partition_key, "user/u1");
        assert_eq!(key.sort_key, "profile");
        assert_eq!(user_a1("alice").partition_key, "username/alice");
    }

    #[test]
    fn test_post_keys() {
        assert_eq!(post_key("p1"), Key::new("post/p1", "-"));

        let a2 = post_a2("u1", PostStatus::Completed, at());
        assert_eq!(a2.slot, IndexSlot::A2);
        assert_eq!(a2.partition_key, "post/u1");
        assert_eq!(
            a2.sort_key,
            AttributeValue::from("COMPLETED/2024-01-15T10:30:00.000Z")
        );
        assert_eq!(post_status_prefix(PostStatus::Archived), "ARCHIVED/");
    }

    #[test]
    fn test_chat_member_keys() {
        assert_eq!(chat_member_key("c1", "u1"), Key::new("chat/c1", "member/u1"));
        assert_eq!(
            chat_member_k1("c1", at()).sort_key,
            AttributeValue::from("member/2024-01-15T10:30:00.000Z")
        );
        let k2 = chat_member_k2("u1", at());
        assert_eq!(k2.partition_key, "member/u1");
        assert_eq!(k2.sort_key, AttributeValue::from("chat/2024-01-15T10:30:00.000Z"));
    }

    #[test]
    fn test_direct_chat_partition_is_order_independent() {
        assert_eq!(direct_chat_partition("b", "a"), "chat/a/b");
        assert_eq!(direct_chat_partition("a", "b"), "chat/a/b");
    }

    #[test]
    fn test_relationship_keys_share_item_partition() {
        let post = ItemRef::post("p1");
        assert_eq!(flag_key(&post, "u1"), Key::new("post/p1", "flag/u1"));
        assert_eq!(view_key(&post, "u1"), Key::new("post/p1", "view/u1"));
        assert_eq!(trending_key(&post), Key::new("post/p1", "trending"));
        assert_eq!(post.item_key(), post_key("p1"));
    }

    #[test]
    fn test_user_item_ref_points_at_profile() {
        assert_eq!(ItemRef::new(ItemKind::User, "u1").item_key(), user_key("u1"));
    }

    #[test]
    fn test_follower_keys() {
        assert_eq!(follower_key("u2", "u1"), Key::new("user/u2", "follower/u1"));
        assert_eq!(
            follower_a1("u1", FollowStatus::Following, at()).partition_key,
            "follower/u1"
        );
        assert_eq!(
            follower_a2("u2", FollowStatus::Following, at()).partition_key,
            "followed/u2"
        );
        assert_eq!(
            first_story_key("u2", "u1"),
            Key::new("user/u2", "follower/u1/firstStory")
        );
        assert_eq!(first_stories_partition("u1"), "follower/u1/firstStory");
    }

    #[test]
    fn test_trending_sort_key_is_numeric() {
        let k3 = trending_k3(ItemKind::Post, 12.5);
        assert_eq!(k3.partition_key, "post/trending");
        assert_eq!(k3.sort_key, AttributeValue::N("12.5".to_string()));
        assert!(IndexSlot::K3.numeric_sort_key());
    }

    #[test]
    fn test_index_slot_attribute_names() {
        assert_eq!(IndexSlot::A1.partition_key_attr(), "gsiA1PartitionKey");
        assert_eq!(IndexSlot::K3.sort_key_attr(), "gsiK3SortKey");
        assert_eq!(IndexSlot::K2.index_name(), "GSI-K2");
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(KeyPrefix::Member.begins_with(), "member/");
        assert_eq!(KeyPrefix::Follower.begins_with(), "follower/");
        assert_eq!(item_kind_prefix(ItemKind::ChatMessage), "chatMessage/");
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("flag/u1", KeyPrefix::Flag), Some("u1"));
        assert_eq!(strip_prefix("like/u1/p1", KeyPrefix::Like), Some("u1/p1"));
        assert_eq!(strip_prefix("flagged/u1", KeyPrefix::Flag), None);
    }

    #[test]
    fn test_key_item_round_trip() {
        let key = chat_member_key("c1", "u1");
        assert_eq!(Key::from_item(&key.to_item()), Some(key));
    }
}
