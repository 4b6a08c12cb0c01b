//! Follow relationships and notification cards.

use futures_util::TryStreamExt;

use onetable_core::entities::{Card, Entity, FollowStatus, Follower, User};
use onetable_core::keys;
use onetable_core::storage::{RepositoryError, Result};

use super::{Coordinator, CoordinatorResult, TransactionBuilder};
use crate::repositories::{CardRepository, FeedRepository, FirstStoryRepository, FollowerRepository, UserRepository};

fn counter_pair(tx: &mut TransactionBuilder, follower: &Follower, increment: bool) {
    let pairs = [
        (&follower.followed_user_id, User::FOLLOWER_COUNT),
        (&follower.follower_user_id, User::FOLLOWED_COUNT),
    ];
    for (user_id, field) in pairs {
        if increment {
            tx.push_or(
                UserRepository::increment_count_op(user_id, field),
                User::not_found(&keys::user_key(user_id)),
            );
        } else {
            tx.push_or(
                UserRepository::decrement_count_op(user_id, field),
                RepositoryError::CounterUnderflow {
                    key: keys::user_key(user_id).to_string(),
                    field: field.to_string(),
                },
            );
        }
    }
}

impl Coordinator {
    // ------------------------------------------------------------------------
    // Follows
    // ------------------------------------------------------------------------

    /// Starts following a user, or requests to when `requires_approval`.
    ///
    /// Counters on both users move only for an accepted follow.
    #[tracing::instrument(skip(self))]
    pub async fn follow(
        &self,
        follower_user_id: &str,
        followed_user_id: &str,
        requires_approval: bool,
    ) -> Result<Follower> {
        let status = if requires_approval {
            FollowStatus::Requested
        } else {
            FollowStatus::Following
        };
        let follower = Follower::new(follower_user_id, followed_user_id, status);

        let mut tx = TransactionBuilder::new();
        tx.push_or(FollowerRepository::add_op(&follower)?, follower.already_exists());
        if status == FollowStatus::Following {
            counter_pair(&mut tx, &follower, true);
        } else {
            tx.push_or(
                UserRepository::check_exists_op(followed_user_id),
                User::not_found(&keys::user_key(followed_user_id)),
            );
        }
        tx.commit(&self.table).await?;
        Ok(follower)
    }

    /// Accepts a follow request and counts the follow on both users.
    #[tracing::instrument(skip(self))]
    pub async fn accept_follow(&self, followed_user_id: &str, follower_user_id: &str) -> Result<Follower> {
        let current = self
            .followers()
            .require(followed_user_id, follower_user_id)
            .await?;

        let mut tx = TransactionBuilder::new();
        tx.push_or(
            FollowerRepository::transition_op(&current, FollowStatus::Following)?,
            RepositoryError::StatusConflict {
                entity_type: Follower::ENTITY_TYPE,
                id: current.key().to_string(),
                expected: current.follow_status.as_str().to_string(),
            },
        );
        counter_pair(&mut tx, &current, true);
        tx.commit(&self.table).await?;

        self.followers().require(followed_user_id, follower_user_id).await
    }

    /// Denies a follow request. No counters change.
    #[tracing::instrument(skip(self))]
    pub async fn deny_follow(&self, followed_user_id: &str, follower_user_id: &str) -> Result<Follower> {
        self.followers()
            .transition(followed_user_id, follower_user_id, FollowStatus::Denied)
            .await
    }

    /// Ends a follow relationship in any status.
    ///
    /// An accepted follow also releases both user counters. Afterwards the
    /// followed user's posts are removed from the follower's feed together
    /// with the cached first story; a failure there is reported as
    /// `ChunkFailed` after the relationship itself is gone.
    #[tracing::instrument(skip(self))]
    pub async fn unfollow(&self, follower_user_id: &str, followed_user_id: &str) -> CoordinatorResult<Follower> {
        let current = self
            .followers()
            .require(followed_user_id, follower_user_id)
            .await?;

        let mut tx = TransactionBuilder::new();
        tx.push_or(
            FollowerRepository::delete_in_status_op(&current),
            RepositoryError::StatusConflict {
                entity_type: Follower::ENTITY_TYPE,
                id: current.key().to_string(),
                expected: current.follow_status.as_str().to_string(),
            },
        );
        if current.follow_status == FollowStatus::Following {
            counter_pair(&mut tx, &current, false);
        }
        tx.commit(&self.table).await?;

        let feed_ops = self
            .feeds()
            .generate_by_poster(follower_user_id, followed_user_id)
            .map_ok(|feed| FeedRepository::delete_op(&feed.feed_user_id, &feed.post_id))
            .try_collect::<Vec<_>>()
            .await?;
        let removed = feed_ops.len();

        let mut ops = feed_ops;
        ops.push(FirstStoryRepository::delete_op(followed_user_id, follower_user_id));
        self.chunked_writer().write(ops).await?;

        tracing::info!(feed_items_removed = removed, "unfollowed");
        Ok(current)
    }

    // ------------------------------------------------------------------------
    // Cards
    // ------------------------------------------------------------------------

    #[tracing::instrument(skip(self, card), fields(card_id = %card.card_id, user_id = %card.user_id))]
    pub async fn add_card(&self, card: Card) -> Result<Card> {
        let mut tx = TransactionBuilder::new();
        tx.push_or(CardRepository::add_op(&card)?, card.already_exists())
            .push_or(
                UserRepository::increment_count_op(&card.user_id, User::CARD_COUNT),
                User::not_found(&keys::user_key(&card.user_id)),
            );
        tx.commit(&self.table).await?;
        Ok(card)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_card(&self, card_id: &str) -> Result<Card> {
        let key = keys::card_key(card_id);
        let card = self
            .cards()
            .get_consistent(card_id)
            .await?
            .ok_or_else(|| Card::not_found(&key))?;

        let mut tx = TransactionBuilder::new();
        tx.push_or(CardRepository::delete_existing_op(card_id), Card::not_found(&key))
            .push_or(
                UserRepository::decrement_count_op(&card.user_id, User::CARD_COUNT),
                RepositoryError::CounterUnderflow {
                    key: keys::user_key(&card.user_id).to_string(),
                    field: User::CARD_COUNT.to_string(),
                },
            );
        tx.commit(&self.table).await?;
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use onetable_core::entities::{Feed, FirstStory};
    use onetable_core::timestamp;

    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;
    use crate::table::Table;

    async fn setup() -> Coordinator {
        let coordinator = Coordinator::new(Table::new(InMemoryEngine::new().with_max_transact_items(3)));
        coordinator.users().add(User::new("ada").with_id("u1")).await.unwrap();
        coordinator.users().add(User::new("grace").with_id("u2")).await.unwrap();
        coordinator
    }

    #[tokio::test]
    async fn test_open_follow_counts_immediately() {
        let coordinator = setup().await;

        coordinator.follow("u1", "u2", false).await.unwrap();

        assert_eq!(coordinator.users().require("u2").await.unwrap().follower_count, 1);
        assert_eq!(coordinator.users().require("u1").await.unwrap().followed_count, 1);
    }

    #[tokio::test]
    async fn test_request_counts_only_after_accept() {
        let coordinator = setup().await;

        coordinator.follow("u1", "u2", true).await.unwrap();
        assert_eq!(coordinator.users().require("u2").await.unwrap().follower_count, 0);

        let accepted = coordinator.accept_follow("u2", "u1").await.unwrap();
        assert_eq!(accepted.follow_status, FollowStatus::Following);
        assert_eq!(coordinator.users().require("u2").await.unwrap().follower_count, 1);

        let again = coordinator.accept_follow("u2", "u1").await;
        assert!(matches!(again, Err(RepositoryError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_follow_unknown_user_is_not_found() {
        let coordinator = setup().await;
        let result = coordinator.follow("u1", "ghost", true).await;
        assert!(matches!(result, Err(RepositoryError::NotFound { entity_type: "User", .. })));
        assert!(coordinator.followers().get("ghost", "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unfollow_cleans_feed_and_counters() {
        let coordinator = setup().await;
        coordinator.follow("u1", "u2", false).await.unwrap();
        let at = timestamp::now();
        for i in 0..5 {
            coordinator
                .feeds()
                .add(Feed::new("u1", format!("p{i}"), "u2", at))
                .await
                .unwrap();
        }
        coordinator.feeds().add(Feed::new("u1", "other", "u3", at)).await.unwrap();
        coordinator
            .first_stories()
            .put(&FirstStory::new("u2", "u1", "p0", at))
            .await
            .unwrap();

        coordinator.unfollow("u1", "u2").await.unwrap();

        let feed = collect_all(coordinator.feeds().generate("u1")).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post_id, "other");
        assert!(coordinator.first_stories().get("u2", "u1").await.unwrap().is_none());
        assert_eq!(coordinator.users().require("u2").await.unwrap().follower_count, 0);
        assert_eq!(coordinator.users().require("u1").await.unwrap().followed_count, 0);

        let again = coordinator.unfollow("u1", "u2").await;
        assert!(matches!(
            again,
            Err(crate::coordinator::CoordinatorError::Repository(RepositoryError::NotFollowing { .. }))
        ));
    }

    #[tokio::test]
    async fn test_cards_count_on_user() {
        let coordinator = setup().await;

        let card = coordinator
            .add_card(Card::new("u1", "Welcome", "open"))
            .await
            .unwrap();
        assert_eq!(coordinator.users().require("u1").await.unwrap().card_count, 1);

        coordinator.delete_card(&card.card_id).await.unwrap();
        assert_eq!(coordinator.users().require("u1").await.unwrap().card_count, 0);
        assert!(matches!(
            coordinator.delete_card(&card.card_id).await,
            Err(RepositoryError::NotFound { entity_type: "Card", .. })
        ));
    }
}
