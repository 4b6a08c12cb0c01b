//! Pure classification of repository errors.
//!
//! Callers decide between retrying with fresh state, surfacing a domain error
//! and aborting based on the class, never on individual variants.

use super::{RepositoryError, StorageError};

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A write precondition failed. Expected and recoverable.
    Conflict,
    /// An item the caller required is absent.
    NotFound,
    /// A transient failure that may succeed if attempted again.
    Transient,
    /// The caller asked for something that can never succeed.
    InvalidInput,
    /// A counter or state invariant would be broken. Programming error.
    InvariantViolation,
    /// Storage failed for good; abort the current operation.
    Fatal,
}

/// Maps a [`RepositoryError`] to its [`ErrorClass`].
///
/// - `AlreadyExists`, `Already*`, `StatusConflict`, `Conflict` -> `Conflict`
/// - `NotFound`, `Not*`, `ViewDoesNotExist` -> `NotFound`
/// - `InvalidTransition` -> `InvalidInput`
/// - `CounterUnderflow`, `InvalidData`, `Serialization` -> `InvariantViolation`
/// - `Storage` -> by the storage error
///
/// # Examples
///
/// ```
/// use onetable_core::storage::{classify, ErrorClass, RepositoryError};
///
/// let error = RepositoryError::AlreadyFlagged {
///     item: "post/p1".to_string(),
///     user_id: "u1".to_string(),
/// };
/// assert_eq!(classify(&error), ErrorClass::Conflict);
/// ```
pub fn classify(error: &RepositoryError) -> ErrorClass {
    match error {
        RepositoryError::AlreadyExists { .. }
        | RepositoryError::AlreadyFlagged { .. }
        | RepositoryError::AlreadyLiked { .. }
        | RepositoryError::ViewAlreadyExists { .. }
        | RepositoryError::AlreadyFollowing { .. }
        | RepositoryError::StatusConflict { .. }
        | RepositoryError::Conflict(_) => ErrorClass::Conflict,
        RepositoryError::NotFound { .. }
        | RepositoryError::NotFlagged { .. }
        | RepositoryError::NotLiked { .. }
        | RepositoryError::ViewDoesNotExist { .. }
        | RepositoryError::NotFollowing { .. } => ErrorClass::NotFound,
        RepositoryError::InvalidTransition { .. } => ErrorClass::InvalidInput,
        RepositoryError::CounterUnderflow { .. }
        | RepositoryError::Serialization(_)
        | RepositoryError::InvalidData(_) => ErrorClass::InvariantViolation,
        RepositoryError::Storage(storage) => classify_storage(storage),
    }
}

/// Maps a [`StorageError`] to its [`ErrorClass`].
pub fn classify_storage(error: &StorageError) -> ErrorClass {
    match error {
        StorageError::ConditionFailed { .. } => ErrorClass::Conflict,
        // Retryable cancellation reasons arrive as `Transient`; a cancellation
        // not pinned to a failed condition will not go away on retry.
        StorageError::TransactionCanceled { failed_index, .. } => match failed_index {
            Some(_) => ErrorClass::Conflict,
            None => ErrorClass::Fatal,
        },
        StorageError::Transient(_) => ErrorClass::Transient,
        StorageError::TransactionTooLarge { .. }
        | StorageError::DuplicateTransactionKey { .. }
        | StorageError::InvalidRequest(_) => ErrorClass::InvalidInput,
        StorageError::InvalidData(_) => ErrorClass::InvariantViolation,
        StorageError::RetriesExhausted { .. } | StorageError::Backend(_) => ErrorClass::Fatal,
    }
}
