use thiserror::Error;

use crate::expression::UpdateError;
use crate::item::ItemError;
use crate::keys::Key;
use crate::rank::RankError;

/// Errors reported by a storage engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("Condition failed for {key}")]
    ConditionFailed { key: Key },
    #[error("Transaction canceled at operation {failed_index:?}: {reason}")]
    TransactionCanceled {
        failed_index: Option<usize>,
        reason: String,
    },
    #[error("Transaction has {size} operations, the limit is {max}")]
    TransactionTooLarge { size: usize, max: usize },
    #[error("Transaction touches {key} more than once")]
    DuplicateTransactionKey { key: Key },
    #[error("Transient failure: {0}")]
    Transient(String),
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last_error: String,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether the retry decorator should try the call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }

    /// Whether a write precondition failed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::ConditionFailed { .. }
                | StorageError::TransactionCanceled {
                    failed_index: Some(_),
                    ..
                }
        )
    }
}

impl From<UpdateError> for StorageError {
    fn from(error: UpdateError) -> Self {
        StorageError::InvalidRequest(error.to_string())
    }
}

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("User {user_id} already flagged {item}")]
    AlreadyFlagged { item: String, user_id: String },
    #[error("User {user_id} has not flagged {item}")]
    NotFlagged { item: String, user_id: String },
    #[error("User {user_id} already liked post {post_id}")]
    AlreadyLiked { post_id: String, user_id: String },
    #[error("User {user_id} has not liked post {post_id}")]
    NotLiked { post_id: String, user_id: String },
    #[error("View of {item} by {user_id} already exists")]
    ViewAlreadyExists { item: String, user_id: String },
    #[error("View of {item} by {user_id} does not exist")]
    ViewDoesNotExist { item: String, user_id: String },
    #[error("User {follower_user_id} already follows {followed_user_id}")]
    AlreadyFollowing {
        follower_user_id: String,
        followed_user_id: String,
    },
    #[error("User {follower_user_id} does not follow {followed_user_id}")]
    NotFollowing {
        follower_user_id: String,
        followed_user_id: String,
    },
    #[error("{entity_type} {id} is not in the expected state {expected}")]
    StatusConflict {
        entity_type: &'static str,
        id: String,
        expected: String,
    },
    #[error("{entity_type} cannot transition from {from} to {to}")]
    InvalidTransition {
        entity_type: &'static str,
        from: String,
        to: String,
    },
    #[error("Counter {field} on {key} would drop below zero")]
    CounterUnderflow { key: String, field: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(StorageError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<StorageError> for RepositoryError {
    fn from(error: StorageError) -> Self {
        if error.is_conflict() {
            RepositoryError::Conflict(error.to_string())
        } else {
            RepositoryError::Storage(error)
        }
    }
}

impl From<ItemError> for RepositoryError {
    fn from(error: ItemError) -> Self {
        match error {
            ItemError::Serialization(message) => RepositoryError::Serialization(message),
            other => RepositoryError::InvalidData(other.to_string()),
        }
    }
}

impl From<RankError> for RepositoryError {
    fn from(error: RankError) -> Self {
        RepositoryError::InvalidData(error.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Result type for storage engine operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_not_found_display() {
        let error = RepositoryError::NotFound {
            entity_type: "Post",
            id: "post/p1|-".to_string(),
        };
        assert_eq!(error.to_string(), "Post not found: post/p1|-");
    }

    #[test]
    fn test_already_flagged_display() {
        let error = RepositoryError::AlreadyFlagged {
            item: "post/p1".to_string(),
            user_id: "u1".to_string(),
        };
        assert_eq!(error.to_string(), "User u1 already flagged post/p1");
    }

    #[test]
    fn test_condition_failure_becomes_conflict() {
        let error: RepositoryError = StorageError::ConditionFailed {
            key: Key::new("post/p1", "-"),
        }
        .into();
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }

    #[test]
    fn test_transient_failure_stays_storage_error() {
        let error: RepositoryError = StorageError::Transient("throttled".to_string()).into();
        assert_eq!(
            error,
            RepositoryError::Storage(StorageError::Transient("throttled".to_string()))
        );
    }

    #[test]
    fn test_canceled_without_index_is_not_conflict() {
        let error = StorageError::TransactionCanceled {
            failed_index: None,
            reason: "ValidationError".to_string(),
        };
        assert!(!error.is_conflict());
        assert!(!error.is_transient());
    }

    #[test]
    fn test_retries_exhausted_display() {
        let error = StorageError::RetriesExhausted {
            operation: "put",
            attempts: 4,
            last_error: "Transient failure: throttled".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "put failed after 4 attempts: Transient failure: throttled"
        );
    }
}
