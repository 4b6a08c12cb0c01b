//! Entity access objects.
//!
//! One repository per entity type. Each wraps a [`Table`](crate::Table) and
//! adds the entity's key construction, its index-specific generators and the
//! `*_op` builders the coordinator composes into transactions. Generic
//! semantics (conditions, domain errors, counters, schema upgrades) live in
//! the table handle, not here.

mod album;
mod card;
mod chat;
mod chat_member;
mod chat_message;
mod comment;
mod feed;
mod first_story;
mod flag;
mod follower;
mod like;
mod post;
mod trending;
mod user;
mod view;

pub use album::AlbumRepository;
pub use card::CardRepository;
pub use chat::ChatRepository;
pub use chat_member::ChatMemberRepository;
pub use chat_message::ChatMessageRepository;
pub use comment::CommentRepository;
pub use feed::FeedRepository;
pub use first_story::FirstStoryRepository;
pub use flag::FlagRepository;
pub use follower::FollowerRepository;
pub use like::LikeRepository;
pub use post::PostRepository;
pub use trending::TrendingRepository;
pub use user::UserRepository;
pub use view::ViewRepository;
