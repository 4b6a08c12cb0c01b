//! Posts, likes, comments, flags, views and album ordering.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use onetable_core::entities::{
    Album, Chat, ChatMessage, Comment, Entity, Flag, Like, LikeStatus, Post, PostStatus, User,
    View,
};
use onetable_core::keys::{self, ItemKind, ItemRef, Key};
use onetable_core::rank::{self, RankError};
use onetable_core::expression::KeyCondition;
use onetable_core::storage::{QueryRequest, RepositoryError, Result, TransactOp};

use super::{CoordinatorResult, Coordinator, TransactionBuilder};
use crate::ops;
use crate::pagination::collect_all;
use crate::repositories::{
    AlbumRepository, CommentRepository, FeedRepository, FlagRepository, LikeRepository,
    PostRepository, UserRepository, ViewRepository,
};

fn underflow(key: &Key, field: &str) -> RepositoryError {
    RepositoryError::CounterUnderflow {
        key: key.to_string(),
        field: field.to_string(),
    }
}

/// A write and the error its failed condition stands for.
type Guarded = (TransactOp, RepositoryError);

/// Key and counter mirroring the flags of an item. Users carry no flag count.
fn flag_counter(item: &ItemRef) -> Option<(Key, &'static str)> {
    let field = match item.kind {
        ItemKind::Post => Post::FLAG_COUNT,
        ItemKind::Comment => Comment::FLAG_COUNT,
        ItemKind::Chat => Chat::FLAG_COUNT,
        ItemKind::ChatMessage => ChatMessage::FLAG_COUNT,
        ItemKind::User => return None,
    };
    Some((item.item_key(), field))
}

impl Coordinator {
    // ------------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------------

    /// Creates a post and counts it on its author (and album, if any).
    #[tracing::instrument(skip(self, post), fields(post_id = %post.post_id))]
    pub async fn create_post(&self, post: Post) -> Result<Post> {
        let mut tx = TransactionBuilder::new();
        tx.push_or(ops::add(&post)?, post.already_exists()).push_or(
            UserRepository::increment_count_op(&post.posted_by_user_id, User::POST_COUNT),
            User::not_found(&keys::user_key(&post.posted_by_user_id)),
        );
        if let Some(album_id) = &post.album_id {
            tx.push_or(
                AlbumRepository::add_post_op(album_id),
                Album::not_found(&keys::album_key(album_id)),
            );
        }
        tx.commit(&self.table).await?;
        Ok(post)
    }

    /// Marks a post `Deleting`, then removes it and releases its counters.
    ///
    /// The items hanging off the post are removed afterwards by
    /// [`Coordinator::delete_post_dependents`].
    #[tracing::instrument(skip(self))]
    pub async fn delete_post(&self, post_id: &str) -> Result<Post> {
        let mut post = self.posts().require(post_id).await?;
        if post.post_status != PostStatus::Deleting {
            post = self
                .posts()
                .transition_status(post_id, PostStatus::Deleting)
                .await?;
        }

        let post_key = keys::post_key(post_id);
        let user_key = keys::user_key(&post.posted_by_user_id);
        let mut tx = TransactionBuilder::new();
        tx.push_or(ops::delete_existing(post_key.clone()), Post::not_found(&post_key))
            .push_or(
                UserRepository::decrement_count_op(&post.posted_by_user_id, User::POST_COUNT),
                underflow(&user_key, User::POST_COUNT),
            );
        if let Some(album_id) = &post.album_id {
            tx.push_or(
                AlbumRepository::decrement_count_op(album_id, Album::POST_COUNT),
                underflow(&keys::album_key(album_id), Album::POST_COUNT),
            );
        }
        tx.commit(&self.table).await?;

        let removed = self
            .delete_post_dependents(post_id, &post.posted_by_user_id)
            .await?;
        tracing::info!(removed, "post deleted");
        Ok(post)
    }

    /// Removes what a deleted post leaves behind: its likes, its comments
    /// with their flags and views, the flags, views and trending score kept
    /// in its partition, and its entries in the feeds of the poster's
    /// followers. Returns how many dependent items were found.
    ///
    /// Every delete tolerates absence, so an interrupted run can be repeated.
    #[tracing::instrument(skip(self))]
    pub async fn delete_post_dependents(
        &self,
        post_id: &str,
        posted_by_user_id: &str,
    ) -> CoordinatorResult<usize> {
        let mut doomed: BTreeSet<Key> = self.partition_keys(&ItemRef::post(post_id)).await?;

        let likes = collect_all(self.likes().generate_by_post(post_id, None)).await?;
        doomed.extend(likes.iter().map(Entity::key));

        let comments = collect_all(self.comments().generate_by_post(post_id)).await?;
        for comment in &comments {
            doomed.insert(comment.key());
            doomed.extend(self.partition_keys(&ItemRef::comment(&comment.comment_id)).await?);
        }

        let followers = collect_all(self.followers().generate_followers(posted_by_user_id, None)).await?;
        let mut writes: Vec<TransactOp> = followers
            .iter()
            .map(|follower| FeedRepository::delete_op(&follower.follower_user_id, post_id))
            .collect();
        writes.push(FeedRepository::delete_op(posted_by_user_id, post_id));

        let removed = doomed.len();
        writes.extend(doomed.into_iter().map(ops::delete));
        self.chunked_writer().write(writes).await?;

        tracing::debug!(likes = likes.len(), comments = comments.len(), removed, "post dependents removed");
        Ok(removed)
    }

    /// Primary keys of every item stored in the partition of `item`.
    async fn partition_keys(&self, item: &ItemRef) -> Result<BTreeSet<Key>> {
        let request = QueryRequest::table(KeyCondition::partition(item.partition_key()));
        let items = collect_all(self.table.generate_items(request)).await?;
        Ok(items.iter().filter_map(Key::from_item).collect())
    }

    /// Removes a dependent item and releases the counter its parent keeps
    /// for it, in one transaction.
    ///
    /// A parent that is already gone has no counter left to release, so
    /// only the removal is committed.
    async fn remove_dependent(&self, removal: Guarded, release: Option<Guarded>) -> Result<()> {
        let Some((release_op, release_error)) = release else {
            let mut tx = TransactionBuilder::new();
            tx.push_or(removal.0, removal.1);
            return tx.commit(&self.table).await;
        };

        let parent = release_op.key()?;
        if self.table.get_item(&parent).await?.is_some() {
            let mut tx = TransactionBuilder::new();
            tx.push_or(removal.0.clone(), removal.1.clone())
                .push_or(release_op, release_error);
            match tx.commit(&self.table).await {
                Err(RepositoryError::CounterUnderflow { key, field }) => {
                    if self.table.get_item(&parent).await?.is_some() {
                        return Err(RepositoryError::CounterUnderflow { key, field });
                    }
                }
                result => return result,
            }
        }

        tracing::debug!(parent = %parent, "parent is gone, removing without releasing its counter");
        let mut tx = TransactionBuilder::new();
        tx.push_or(removal.0, removal.1);
        tx.commit(&self.table).await
    }

    // ------------------------------------------------------------------------
    // Likes
    // ------------------------------------------------------------------------

    /// Likes a post and bumps the post's counter for that kind of like.
    #[tracing::instrument(skip(self))]
    pub async fn like_post(&self, user_id: &str, post_id: &str, status: LikeStatus) -> Result<Like> {
        let post = self.posts().require(post_id).await?;
        let like = Like::new(user_id, post_id, &post.posted_by_user_id, status);

        let mut tx = TransactionBuilder::new();
        tx.push_or(LikeRepository::add_op(&like)?, like.already_exists())
            .push_or(
                PostRepository::increment_count_op(post_id, status.post_counter()),
                Post::not_found(&keys::post_key(post_id)),
            );
        tx.commit(&self.table).await?;
        Ok(like)
    }

    /// Removes a like; fails with `NotLiked` when there is none.
    #[tracing::instrument(skip(self))]
    pub async fn unlike_post(&self, user_id: &str, post_id: &str) -> Result<Like> {
        let like_key = keys::like_key(user_id, post_id);
        let like = self
            .likes()
            .get_consistent(user_id, post_id)
            .await?
            .ok_or_else(|| Like::not_found(&like_key))?;
        let counter = like.like_status.post_counter();

        self.remove_dependent(
            (
                LikeRepository::delete_existing_op(user_id, post_id),
                Like::not_found(&like_key),
            ),
            Some((
                PostRepository::decrement_count_op(post_id, counter),
                underflow(&keys::post_key(post_id), counter),
            )),
        )
        .await?;
        Ok(like)
    }

    // ------------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------------

    #[tracing::instrument(skip(self, comment), fields(comment_id = %comment.comment_id, post_id = %comment.post_id))]
    pub async fn add_comment(&self, comment: Comment) -> Result<Comment> {
        let mut tx = TransactionBuilder::new();
        tx.push_or(CommentRepository::add_op(&comment)?, comment.already_exists())
            .push_or(
                PostRepository::increment_count_op(&comment.post_id, Post::COMMENT_COUNT),
                Post::not_found(&keys::post_key(&comment.post_id)),
            );
        tx.commit(&self.table).await?;
        Ok(comment)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_comment(&self, comment_id: &str) -> Result<Comment> {
        let key = keys::comment_key(comment_id);
        let comment: Comment = self
            .table
            .get_consistent(&key)
            .await?
            .ok_or_else(|| Comment::not_found(&key))?;

        self.remove_dependent(
            (CommentRepository::delete_existing_op(comment_id), Comment::not_found(&key)),
            Some((
                PostRepository::decrement_count_op(&comment.post_id, Post::COMMENT_COUNT),
                underflow(&keys::post_key(&comment.post_id), Post::COMMENT_COUNT),
            )),
        )
        .await?;
        Ok(comment)
    }

    // ------------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------------

    /// Flags an item; flagging twice fails with `AlreadyFlagged`.
    #[tracing::instrument(skip(self, item), fields(item = %item))]
    pub async fn flag_item(&self, item: &ItemRef, user_id: &str) -> Result<Flag> {
        let flag = Flag::new(item, user_id);

        let mut tx = TransactionBuilder::new();
        tx.push_or(FlagRepository::add_op(&flag)?, flag.already_exists());
        if let Some((key, field)) = flag_counter(item) {
            tx.push_or(ops::increment(key.clone(), field, 1), RepositoryError::NotFound {
                entity_type: "Item",
                id: key.to_string(),
            });
        }
        tx.commit(&self.table).await?;
        Ok(flag)
    }

    /// Removes a flag; fails with `NotFlagged` when there is none.
    #[tracing::instrument(skip(self, item), fields(item = %item))]
    pub async fn unflag_item(&self, item: &ItemRef, user_id: &str) -> Result<Flag> {
        let flag_key = keys::flag_key(item, user_id);
        let flag: Flag = self
            .table
            .get_consistent(&flag_key)
            .await?
            .ok_or_else(|| Flag::not_found(&flag_key))?;

        let release = flag_counter(item).map(|(key, field)| {
            let error = underflow(&key, field);
            (ops::decrement(key, field, 1), error)
        });
        self.remove_dependent(
            (FlagRepository::delete_existing_op(item, user_id), Flag::not_found(&flag_key)),
            release,
        )
        .await?;
        Ok(flag)
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    /// Records views of a post. The first view by a user also counts the
    /// user in the post's `viewedByCount`.
    #[tracing::instrument(skip(self))]
    pub async fn record_post_view(
        &self,
        post_id: &str,
        user_id: &str,
        view_count: i64,
        viewed_at: DateTime<Utc>,
    ) -> Result<View> {
        let item = ItemRef::post(post_id);
        if self.views().get_consistent(&item, user_id).await?.is_none() {
            let view = View::new(&item, user_id, view_count, viewed_at);
            let mut tx = TransactionBuilder::new();
            tx.push_or(ViewRepository::add_op(&view)?, view.already_exists())
                .push_or(
                    PostRepository::increment_count_op(post_id, Post::VIEWED_BY_COUNT),
                    Post::not_found(&keys::post_key(post_id)),
                );
            match tx.commit(&self.table).await {
                Ok(()) => return Ok(view),
                Err(RepositoryError::ViewAlreadyExists { .. }) => {
                    tracing::debug!("view created concurrently, counting as a repeat");
                }
                Err(err) => return Err(err),
            }
        }

        let (view, _) = self
            .views()
            .record_view(&item, user_id, view_count, viewed_at)
            .await?;
        Ok(view)
    }

    // ------------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------------

    /// Puts a post into an album at `position` (appended when `None`).
    ///
    /// The new rank lies between the neighbours' ranks. When it has grown
    /// too long the album is rebalanced right away.
    #[tracing::instrument(skip(self))]
    pub async fn add_post_to_album(
        &self,
        post_id: &str,
        album_id: &str,
        position: Option<usize>,
    ) -> Result<Post> {
        let post = self.posts().require(post_id).await?;
        if let Some(current) = &post.album_id {
            return Err(RepositoryError::Conflict(format!(
                "Post {post_id} is already in album {current}"
            )));
        }

        let rank = match self.album_rank_at(album_id, position).await? {
            Ok(rank) => rank,
            Err(err @ RankError::OutOfOrder { .. }) => {
                tracing::info!(error = %err, "neighbouring ranks leave no room, rebalancing");
                self.rebalance_album(album_id).await?;
                self.album_rank_at(album_id, position).await??
            }
            Err(err) => return Err(err.into()),
        };

        let mut tx = TransactionBuilder::new();
        tx.push_or(
            PostRepository::set_album_op(post_id, album_id, &rank),
            RepositoryError::Conflict(format!("Post {post_id} is missing or already in an album")),
        )
        .push_or(
            AlbumRepository::add_post_op(album_id),
            Album::not_found(&keys::album_key(album_id)),
        );
        tx.commit(&self.table).await?;

        if rank::needs_rebalance(&rank) {
            tracing::info!(rank_len = rank.len(), "album ranks too long, rebalancing");
            self.rebalance_album(album_id).await?;
        }

        self.posts().require(post_id).await
    }

    /// A rank for a new post at `position` among the album's posts.
    async fn album_rank_at(
        &self,
        album_id: &str,
        position: Option<usize>,
    ) -> Result<std::result::Result<String, RankError>> {
        let ranked = collect_all(self.posts().generate_by_album(album_id)).await?;
        let index = position.unwrap_or(ranked.len()).min(ranked.len());
        let before = index
            .checked_sub(1)
            .and_then(|i| ranked.get(i))
            .and_then(|p| p.album_rank.as_deref());
        let after = ranked.get(index).and_then(|p| p.album_rank.as_deref());
        Ok(rank::rank_between(before, after))
    }

    /// Takes a post out of an album.
    #[tracing::instrument(skip(self))]
    pub async fn remove_post_from_album(&self, post_id: &str, album_id: &str) -> Result<()> {
        let mut tx = TransactionBuilder::new();
        tx.push_or(
            PostRepository::remove_from_album_op(post_id, album_id),
            RepositoryError::Conflict(format!("Post {post_id} is not in album {album_id}")),
        )
        .push_or(
            AlbumRepository::decrement_count_op(album_id, Album::POST_COUNT),
            underflow(&keys::album_key(album_id), Album::POST_COUNT),
        );
        tx.commit(&self.table).await
    }

    /// Respaces the ranks of every post in an album evenly, keeping their
    /// order. Returns how many posts were re-ranked.
    #[tracing::instrument(skip(self))]
    pub async fn rebalance_album(&self, album_id: &str) -> CoordinatorResult<usize> {
        let posts = collect_all(self.posts().generate_by_album(album_id)).await?;
        let ranks = rank::evenly_spaced(posts.len());

        let ops: Vec<TransactOp> = posts
            .iter()
            .zip(&ranks)
            .filter(|(post, rank)| post.album_rank.as_deref() != Some(rank.as_str()))
            .map(|(post, rank)| PostRepository::set_rank_op(&post.post_id, album_id, rank))
            .collect();
        let changed = ops.len();

        self.chunked_writer().write(ops).await?;
        self.table
            .increment_counter::<Album>(&keys::album_key(album_id), Album::RANK_COUNT, 1)
            .await?;

        tracing::info!(posts = posts.len(), changed, "album rebalanced");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use onetable_core::entities::{Feed, PostType, Trending};
    use onetable_core::expression::Update;
    use onetable_core::timestamp;

    use super::*;
    use crate::storage::InMemoryEngine;
    use crate::table::Table;

    async fn setup() -> Coordinator {
        let coordinator = Coordinator::new(Table::new(InMemoryEngine::new()));
        coordinator.users().add(User::new("ada").with_id("u1")).await.unwrap();
        coordinator.users().add(User::new("grace").with_id("u2")).await.unwrap();
        coordinator
            .create_post(Post::new("u1", PostType::Image).with_id("p1"))
            .await
            .unwrap();
        coordinator
    }

    #[tokio::test]
    async fn test_create_post_counts_on_author() {
        let coordinator = setup().await;
        let user = coordinator.users().require("u1").await.unwrap();
        assert_eq!(user.post_count, 1);
    }

    #[tokio::test]
    async fn test_like_and_unlike_round_trip() {
        let coordinator = setup().await;

        coordinator.like_post("u2", "p1", LikeStatus::Anonymous).await.unwrap();
        let post = coordinator.posts().require("p1").await.unwrap();
        assert_eq!(post.anonymous_like_count, 1);
        assert_eq!(post.onymous_like_count, 0);

        let again = coordinator.like_post("u2", "p1", LikeStatus::Onymous).await;
        assert_eq!(
            again,
            Err(RepositoryError::AlreadyLiked {
                post_id: "p1".to_string(),
                user_id: "u2".to_string(),
            })
        );

        coordinator.unlike_post("u2", "p1").await.unwrap();
        let post = coordinator.posts().require("p1").await.unwrap();
        assert_eq!(post.like_count(), 0);

        assert!(matches!(
            coordinator.unlike_post("u2", "p1").await,
            Err(RepositoryError::NotLiked { .. })
        ));
    }

    #[tokio::test]
    async fn test_like_missing_post_is_not_found() {
        let coordinator = setup().await;
        let result = coordinator.like_post("u2", "nope", LikeStatus::Onymous).await;
        assert!(matches!(result, Err(RepositoryError::NotFound { entity_type: "Post", .. })));
    }

    #[tokio::test]
    async fn test_comment_counts() {
        let coordinator = setup().await;
        let comment = coordinator
            .add_comment(Comment::new("p1", "u2", "nice").with_id("k1"))
            .await
            .unwrap();
        assert_eq!(coordinator.posts().require("p1").await.unwrap().comment_count, 1);

        coordinator.delete_comment(&comment.comment_id).await.unwrap();
        assert_eq!(coordinator.posts().require("p1").await.unwrap().comment_count, 0);
    }

    #[tokio::test]
    async fn test_flag_and_unflag_post() {
        let coordinator = setup().await;
        let post = ItemRef::post("p1");

        coordinator.flag_item(&post, "u2").await.unwrap();
        let twice = coordinator.flag_item(&post, "u2").await;
        assert!(matches!(twice, Err(RepositoryError::AlreadyFlagged { .. })));
        assert_eq!(coordinator.posts().require("p1").await.unwrap().flag_count, 1);

        coordinator.unflag_item(&post, "u2").await.unwrap();
        assert_eq!(coordinator.posts().require("p1").await.unwrap().flag_count, 0);
        assert!(matches!(
            coordinator.unflag_item(&post, "u2").await,
            Err(RepositoryError::NotFlagged { .. })
        ));
    }

    #[tokio::test]
    async fn test_flag_user_has_no_counter() {
        let coordinator = setup().await;
        let flag = coordinator
            .flag_item(&ItemRef::new(ItemKind::User, "u1"), "u2")
            .await
            .unwrap();
        assert_eq!(flag.item_kind, ItemKind::User);
    }

    #[tokio::test]
    async fn test_post_views_count_viewers_once() {
        let coordinator = setup().await;
        let at = timestamp::now();

        coordinator.record_post_view("p1", "u2", 1, at).await.unwrap();
        let view = coordinator.record_post_view("p1", "u2", 1, at).await.unwrap();

        assert_eq!(view.view_count, 2);
        let post = coordinator.posts().require("p1").await.unwrap();
        assert_eq!(post.viewed_by_count, 1);
    }

    #[tokio::test]
    async fn test_delete_post_releases_author_count() {
        let coordinator = setup().await;

        let deleted = coordinator.delete_post("p1").await.unwrap();

        assert_eq!(deleted.post_status, PostStatus::Deleting);
        assert!(coordinator.posts().get("p1").await.unwrap().is_none());
        assert_eq!(coordinator.users().require("u1").await.unwrap().post_count, 0);
    }

    #[tokio::test]
    async fn test_delete_post_removes_dependents() {
        let coordinator = setup().await;
        let post = ItemRef::post("p1");
        coordinator.follow("u2", "u1", false).await.unwrap();
        coordinator
            .feeds()
            .add(Feed::new("u2", "p1", "u1", timestamp::now()))
            .await
            .unwrap();
        coordinator.like_post("u2", "p1", LikeStatus::Onymous).await.unwrap();
        coordinator.flag_item(&post, "u2").await.unwrap();
        coordinator
            .record_post_view("p1", "u2", 1, timestamp::now())
            .await
            .unwrap();
        coordinator.table().put(&Trending::new(&post, 3.0)).await.unwrap();
        let comment = coordinator
            .add_comment(Comment::new("p1", "u2", "nice").with_id("k1"))
            .await
            .unwrap();
        let commented = ItemRef::comment(&comment.comment_id);
        coordinator.flag_item(&commented, "u1").await.unwrap();

        coordinator.delete_post("p1").await.unwrap();

        for key in [
            keys::like_key("u2", "p1"),
            keys::flag_key(&post, "u2"),
            keys::view_key(&post, "u2"),
            keys::trending_key(&post),
            keys::comment_key("k1"),
            keys::flag_key(&commented, "u1"),
            keys::feed_key("u2", "p1"),
        ] {
            let stored = coordinator.table().get_item(&key).await.unwrap();
            assert!(stored.is_none(), "{key} outlived its post");
        }
        assert!(matches!(
            coordinator.unlike_post("u2", "p1").await,
            Err(RepositoryError::NotLiked { .. })
        ));
    }

    #[tokio::test]
    async fn test_dependents_of_missing_post_are_removable() {
        let coordinator = setup().await;
        let post = ItemRef::post("p1");
        coordinator.like_post("u2", "p1", LikeStatus::Anonymous).await.unwrap();
        coordinator.flag_item(&post, "u2").await.unwrap();
        coordinator
            .add_comment(Comment::new("p1", "u2", "nice").with_id("k1"))
            .await
            .unwrap();
        coordinator
            .table()
            .delete::<Post>(&keys::post_key("p1"))
            .await
            .unwrap();

        coordinator.unlike_post("u2", "p1").await.unwrap();
        coordinator.unflag_item(&post, "u2").await.unwrap();
        coordinator.delete_comment("k1").await.unwrap();

        assert!(coordinator.likes().get_consistent("u2", "p1").await.unwrap().is_none());
        assert!(coordinator.flags().get_consistent(&post, "u2").await.unwrap().is_none());
        assert!(coordinator
            .table()
            .get_item(&keys::comment_key("k1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unlike_keeps_underflow_while_post_exists() {
        let coordinator = setup().await;
        coordinator.like_post("u2", "p1", LikeStatus::Onymous).await.unwrap();
        coordinator
            .table()
            .transact(&[ops::update_existing(
                keys::post_key("p1"),
                Update::new().set(Post::ONYMOUS_LIKE_COUNT, 0_i64),
            )])
            .await
            .unwrap();

        let result = coordinator.unlike_post("u2", "p1").await;

        assert!(matches!(result, Err(RepositoryError::CounterUnderflow { .. })));
        assert!(coordinator.likes().get_consistent("u2", "p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_album_insertion_keeps_requested_order() {
        let coordinator = setup().await;
        coordinator
            .albums()
            .add(Album::new("u1", "trip").with_id("a1"))
            .await
            .unwrap();
        for id in ["p2", "p3", "p4"] {
            coordinator
                .create_post(Post::new("u1", PostType::Image).with_id(id))
                .await
                .unwrap();
        }

        coordinator.add_post_to_album("p1", "a1", None).await.unwrap();
        coordinator.add_post_to_album("p2", "a1", None).await.unwrap();
        coordinator.add_post_to_album("p3", "a1", Some(0)).await.unwrap();
        coordinator.add_post_to_album("p4", "a1", Some(2)).await.unwrap();

        let posts = collect_all(coordinator.posts().generate_by_album("a1")).await.unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1", "p4", "p2"]);

        let album = coordinator.albums().require("a1").await.unwrap();
        assert_eq!(album.post_count, 4);

        let twice = coordinator.add_post_to_album("p1", "a1", None).await;
        assert!(matches!(twice, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_repeated_front_insertion_triggers_rebalance() {
        let coordinator = setup().await;
        coordinator
            .albums()
            .add(Album::new("u1", "stack").with_id("a1"))
            .await
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..90 {
            let id = format!("s{i}");
            coordinator
                .create_post(Post::new("u1", PostType::Image).with_id(id.clone()))
                .await
                .unwrap();
            coordinator.add_post_to_album(&id, "a1", Some(0)).await.unwrap();
            ids.insert(0, id);
        }

        let posts = collect_all(coordinator.posts().generate_by_album("a1")).await.unwrap();
        let ordered: Vec<_> = posts.iter().map(|p| p.post_id.clone()).collect();
        assert_eq!(ordered, ids);
        assert!(posts
            .iter()
            .all(|p| !rank::needs_rebalance(p.album_rank.as_deref().unwrap_or_default())));

        let album = coordinator.albums().require("a1").await.unwrap();
        assert!(album.rank_count > 90);
    }

    #[tokio::test]
    async fn test_insert_between_equal_ranks_rebalances_first() {
        let coordinator = setup().await;
        coordinator
            .albums()
            .add(Album::new("u1", "tied").with_id("a1"))
            .await
            .unwrap();
        for id in ["p2", "p3"] {
            coordinator
                .create_post(Post::new("u1", PostType::Image).with_id(id))
                .await
                .unwrap();
        }
        let first = coordinator.add_post_to_album("p1", "a1", None).await.unwrap();
        coordinator.add_post_to_album("p2", "a1", None).await.unwrap();
        let tied = first.album_rank.unwrap();
        coordinator
            .table()
            .transact(&[PostRepository::set_rank_op("p2", "a1", &tied)])
            .await
            .unwrap();

        coordinator.add_post_to_album("p3", "a1", Some(1)).await.unwrap();

        let posts = collect_all(coordinator.posts().generate_by_album("a1")).await.unwrap();
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[1].post_id, "p3");
        let ranks: Vec<_> = posts.iter().filter_map(|p| p.album_rank.clone()).collect();
        assert!(ranks.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_remove_post_from_album() {
        let coordinator = setup().await;
        coordinator
            .albums()
            .add(Album::new("u1", "trip").with_id("a1"))
            .await
            .unwrap();
        coordinator.add_post_to_album("p1", "a1", None).await.unwrap();

        coordinator.remove_post_from_album("p1", "a1").await.unwrap();

        let post = coordinator.posts().require("p1").await.unwrap();
        assert!(post.album_id.is_none());
        assert!(collect_all(coordinator.posts().generate_by_album("a1"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(coordinator.albums().require("a1").await.unwrap().post_count, 0);
    }
}
