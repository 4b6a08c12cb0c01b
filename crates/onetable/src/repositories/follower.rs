use onetable_core::entities::{Entity, FollowStatus, Follower};
use onetable_core::expression::{Condition, KeyCondition, Update};
use onetable_core::keys::{self, IndexSlot, Key};
use onetable_core::storage::{QueryRequest, RepositoryError, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `Follower` items.
#[derive(Debug, Clone)]
pub struct FollowerRepository {
    table: Table,
}

impl FollowerRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, followed_user_id: &str, follower_user_id: &str) -> Result<Option<Follower>> {
        self.table
            .get(&keys::follower_key(followed_user_id, follower_user_id))
            .await
    }

    /// Strong read of the relationship; fails with `NotFollowing` when absent.
    pub async fn require(&self, followed_user_id: &str, follower_user_id: &str) -> Result<Follower> {
        let key = keys::follower_key(followed_user_id, follower_user_id);
        self.table
            .get_consistent(&key)
            .await?
            .ok_or_else(|| Follower::not_found(&key))
    }

    pub async fn add(&self, follower: Follower) -> Result<Follower> {
        self.table.add(follower).await
    }

    pub async fn delete(&self, followed_user_id: &str, follower_user_id: &str) -> Result<Option<Follower>> {
        self.table
            .delete(&keys::follower_key(followed_user_id, follower_user_id))
            .await
    }

    /// Moves a relationship to `next`, rewriting both status indexes.
    pub async fn transition(
        &self,
        followed_user_id: &str,
        follower_user_id: &str,
        next: FollowStatus,
    ) -> Result<Follower> {
        let current = self.require(followed_user_id, follower_user_id).await?;
        let (key, update, expected) = Self::transition_parts(&current, next)?;
        self.table
            .transition(&key, Follower::FOLLOW_STATUS, expected, &update)
            .await
    }

    /// Users following `followed_user_id`, oldest first within a status.
    pub fn generate_followers(&self, followed_user_id: &str, status: Option<FollowStatus>) -> ResultStream<Follower> {
        let mut condition = KeyCondition::partition(keys::followers_of_partition(followed_user_id));
        if let Some(status) = status {
            condition = condition.begins_with(keys::follow_status_prefix(status));
        }
        self.table.generate(QueryRequest::index(IndexSlot::A2, condition))
    }

    /// Users followed by `follower_user_id`, oldest first within a status.
    pub fn generate_followeds(&self, follower_user_id: &str, status: Option<FollowStatus>) -> ResultStream<Follower> {
        let mut condition = KeyCondition::partition(keys::followed_by_partition(follower_user_id));
        if let Some(status) = status {
            condition = condition.begins_with(keys::follow_status_prefix(status));
        }
        self.table.generate(QueryRequest::index(IndexSlot::A1, condition))
    }

    pub fn add_op(follower: &Follower) -> Result<TransactOp> {
        ops::add(follower)
    }

    /// Deletes the relationship only while it is still in the status it was
    /// read with.
    pub fn delete_in_status_op(follower: &Follower) -> TransactOp {
        TransactOp::Delete {
            key: follower.key(),
            condition: Some(Condition::eq(
                Follower::FOLLOW_STATUS,
                follower.follow_status.as_str(),
            )),
        }
    }

    /// Transaction form of [`Self::transition`], conditioned on the status
    /// `current` was read with.
    pub fn transition_op(current: &Follower, next: FollowStatus) -> Result<TransactOp> {
        let (key, update, expected) = Self::transition_parts(current, next)?;
        Ok(ops::update_if(key, update, Condition::eq(Follower::FOLLOW_STATUS, expected)))
    }

    fn transition_parts(
        current: &Follower,
        next: FollowStatus,
    ) -> Result<(Key, Update, &'static str)> {
        if !current.follow_status.can_transition_to(next) {
            return Err(RepositoryError::InvalidTransition {
                entity_type: Follower::ENTITY_TYPE,
                from: current.follow_status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        let update = current
            .status_index_keys(next)
            .iter()
            .fold(Update::new().set(Follower::FOLLOW_STATUS, next.as_str()), |update, index| {
                update.set_index(index)
            });
        Ok((current.key(), update, current.follow_status.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;

    fn repo() -> FollowerRepository {
        FollowerRepository::new(Table::new(InMemoryEngine::new()))
    }

    #[tokio::test]
    async fn test_follow_twice_is_already_following() {
        let repo = repo();
        repo.add(Follower::new("u1", "u2", FollowStatus::Requested))
            .await
            .unwrap();

        let result = repo.add(Follower::new("u1", "u2", FollowStatus::Requested)).await;

        assert_eq!(
            result,
            Err(RepositoryError::AlreadyFollowing {
                follower_user_id: "u1".to_string(),
                followed_user_id: "u2".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_accept_moves_between_status_indexes() {
        let repo = repo();
        repo.add(Follower::new("u1", "u2", FollowStatus::Requested))
            .await
            .unwrap();

        let accepted = repo.transition("u2", "u1", FollowStatus::Following).await.unwrap();
        assert_eq!(accepted.follow_status, FollowStatus::Following);

        let requested = collect_all(repo.generate_followers("u2", Some(FollowStatus::Requested)))
            .await
            .unwrap();
        let following = collect_all(repo.generate_followers("u2", Some(FollowStatus::Following)))
            .await
            .unwrap();
        let followeds = collect_all(repo.generate_followeds("u1", Some(FollowStatus::Following)))
            .await
            .unwrap();

        assert!(requested.is_empty());
        assert_eq!(following.len(), 1);
        assert_eq!(followeds[0].followed_user_id, "u2");
    }

    #[tokio::test]
    async fn test_following_cannot_be_denied() {
        let repo = repo();
        repo.add(Follower::new("u1", "u2", FollowStatus::Following))
            .await
            .unwrap();

        let result = repo.transition("u2", "u1", FollowStatus::Denied).await;

        assert!(matches!(result, Err(RepositoryError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_transition_missing_is_not_following() {
        let result = repo().transition("u2", "u1", FollowStatus::Following).await;
        assert!(matches!(result, Err(RepositoryError::NotFollowing { .. })));
    }
}
