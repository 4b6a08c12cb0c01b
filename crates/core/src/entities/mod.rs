//! Entity types stored in the table.
//!
//! Each entity knows its primary key, the index slots it populates and how
//! to upgrade items written with an older `schemaVersion`.

mod album;
mod card;
mod chat;
mod follow;
mod post;
mod social;
mod trending;
mod user;

pub use album::Album;
pub use card::Card;
pub use chat::{Chat, ChatMember, ChatMessage, ChatType};
pub use follow::{Feed, FirstStory, FollowStatus, Follower};
pub use post::{Post, PostStatus, PostType};
pub use social::{Comment, Flag, Like, LikeStatus, View};
pub use trending::Trending;
pub use user::User;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::item::{self, AttributeValue, Item, ItemError};
use crate::keys::{self, IndexKey, Key};
use crate::storage::RepositoryError;

/// An entity type persisted as one item.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    /// Name used in errors and logs.
    const ENTITY_TYPE: &'static str;

    /// Current shape version written to `schemaVersion`.
    const SCHEMA_VERSION: i64 = 0;

    fn key(&self) -> Key;

    /// Index slots this item populates.
    fn index_keys(&self) -> Vec<IndexKey> {
        Vec::new()
    }

    /// Rewrites an item stored at `from_version` into the current shape.
    fn upgrade(_from_version: i64, _item: &mut Item) -> Result<(), ItemError> {
        Ok(())
    }

    /// Error for a second `add` of the same item.
    fn already_exists(&self) -> RepositoryError {
        RepositoryError::AlreadyExists {
            entity_type: Self::ENTITY_TYPE,
            id: self.key().to_string(),
        }
    }

    /// Error for a required item that is absent.
    fn not_found(key: &Key) -> RepositoryError {
        RepositoryError::NotFound {
            entity_type: Self::ENTITY_TYPE,
            id: key.to_string(),
        }
    }

    /// The full item: attributes, primary key, schema version and indexes.
    fn to_item(&self) -> Result<Item, ItemError> {
        let mut item = item::to_item(self)?;
        item.extend(self.key().to_item());
        item.insert(
            keys::SCHEMA_VERSION.to_string(),
            AttributeValue::number(Self::SCHEMA_VERSION),
        );
        for index in self.index_keys() {
            index.apply(&mut item);
        }
        Ok(item)
    }

    fn from_item(item: &Item) -> Result<Self, ItemError> {
        item::from_item(item)
    }
}

/// The `schemaVersion` of a stored item. Items written before versioning
/// count as version 0.
pub fn schema_version(item: &Item) -> i64 {
    item.get(keys::SCHEMA_VERSION)
        .and_then(AttributeValue::as_i64)
        .unwrap_or(0)
}
