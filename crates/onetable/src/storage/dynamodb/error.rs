//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StorageError` from `onetable_core::storage`.
//! Throttling, server errors and transport failures become
//! `StorageError::Transient` so the retry decorator can act on them.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::CancellationReason;
use onetable_core::keys::Key;
use onetable_core::storage::StorageError;

const THROUGHPUT_EXCEEDED: &str = "Throughput exceeded, please retry";
const REQUEST_LIMIT_EXCEEDED: &str = "Request limit exceeded, please retry";
const INTERNAL_SERVER_ERROR: &str = "DynamoDB internal server error";
const TRANSACTION_CONFLICT: &str = "Transaction conflict, please retry";
const TABLE_NOT_FOUND: &str = "Table not found";

fn transient(message: &str) -> StorageError {
    StorageError::Transient(message.to_string())
}

/// Errors raised before a service response was parsed.
fn transport_error<E, R>(err: &SdkError<E, R>) -> Option<StorageError> {
    match err {
        SdkError::TimeoutError(_) => Some(transient("Request timed out")),
        SdkError::DispatchFailure(_) => Some(transient("Request dispatch failed")),
        SdkError::ResponseError(_) => Some(transient("Malformed response")),
        _ => None,
    }
}

/// Map a GetItem SDK error to StorageError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> StorageError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => {
            StorageError::Backend(TABLE_NOT_FOUND.to_string())
        }
        GetItemError::ProvisionedThroughputExceededException(_) => transient(THROUGHPUT_EXCEEDED),
        GetItemError::RequestLimitExceeded(_) => transient(REQUEST_LIMIT_EXCEEDED),
        GetItemError::InternalServerError(_) => transient(INTERNAL_SERVER_ERROR),
        err => StorageError::Backend(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a PutItem SDK error to StorageError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    key: &Key,
) -> StorageError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => {
            StorageError::ConditionFailed { key: key.clone() }
        }
        PutItemError::ResourceNotFoundException(_) => {
            StorageError::Backend(TABLE_NOT_FOUND.to_string())
        }
        PutItemError::ProvisionedThroughputExceededException(_) => transient(THROUGHPUT_EXCEEDED),
        PutItemError::RequestLimitExceeded(_) => transient(REQUEST_LIMIT_EXCEEDED),
        PutItemError::TransactionConflictException(_) => transient(TRANSACTION_CONFLICT),
        PutItemError::InternalServerError(_) => transient(INTERNAL_SERVER_ERROR),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            StorageError::Backend("Item collection size limit exceeded".to_string())
        }
        err => StorageError::Backend(format!("PutItem failed: {:?}", err)),
    }
}

/// Map an UpdateItem SDK error to StorageError.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    key: &Key,
) -> StorageError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => {
            StorageError::ConditionFailed { key: key.clone() }
        }
        UpdateItemError::ResourceNotFoundException(_) => {
            StorageError::Backend(TABLE_NOT_FOUND.to_string())
        }
        UpdateItemError::ProvisionedThroughputExceededException(_) => {
            transient(THROUGHPUT_EXCEEDED)
        }
        UpdateItemError::RequestLimitExceeded(_) => transient(REQUEST_LIMIT_EXCEEDED),
        UpdateItemError::TransactionConflictException(_) => transient(TRANSACTION_CONFLICT),
        UpdateItemError::InternalServerError(_) => transient(INTERNAL_SERVER_ERROR),
        UpdateItemError::ItemCollectionSizeLimitExceededException(_) => {
            StorageError::Backend("Item collection size limit exceeded".to_string())
        }
        err => StorageError::Backend(format!("UpdateItem failed: {:?}", err)),
    }
}

/// Map a DeleteItem SDK error to StorageError.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    key: &Key,
) -> StorageError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(_) => {
            StorageError::ConditionFailed { key: key.clone() }
        }
        DeleteItemError::ResourceNotFoundException(_) => {
            StorageError::Backend(TABLE_NOT_FOUND.to_string())
        }
        DeleteItemError::ProvisionedThroughputExceededException(_) => {
            transient(THROUGHPUT_EXCEEDED)
        }
        DeleteItemError::RequestLimitExceeded(_) => transient(REQUEST_LIMIT_EXCEEDED),
        DeleteItemError::TransactionConflictException(_) => transient(TRANSACTION_CONFLICT),
        DeleteItemError::InternalServerError(_) => transient(INTERNAL_SERVER_ERROR),
        err => StorageError::Backend(format!("DeleteItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to StorageError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> StorageError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => {
            StorageError::Backend(TABLE_NOT_FOUND.to_string())
        }
        QueryError::ProvisionedThroughputExceededException(_) => transient(THROUGHPUT_EXCEEDED),
        QueryError::RequestLimitExceeded(_) => transient(REQUEST_LIMIT_EXCEEDED),
        QueryError::InternalServerError(_) => transient(INTERNAL_SERVER_ERROR),
        err => StorageError::Backend(format!("Query failed: {:?}", err)),
    }
}

/// Map a BatchGetItem SDK error to StorageError.
pub fn map_batch_get_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchGetItemError, R>,
) -> StorageError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        BatchGetItemError::ResourceNotFoundException(_) => {
            StorageError::Backend(TABLE_NOT_FOUND.to_string())
        }
        BatchGetItemError::ProvisionedThroughputExceededException(_) => {
            transient(THROUGHPUT_EXCEEDED)
        }
        BatchGetItemError::RequestLimitExceeded(_) => transient(REQUEST_LIMIT_EXCEEDED),
        BatchGetItemError::InternalServerError(_) => transient(INTERNAL_SERVER_ERROR),
        err => StorageError::Backend(format!("BatchGetItem failed: {:?}", err)),
    }
}

/// Map a TransactWriteItems SDK error to StorageError.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
) -> StorageError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(canceled) => {
            map_cancellation_reasons(canceled.cancellation_reasons())
        }
        TransactWriteItemsError::TransactionInProgressException(_) => {
            transient("Transaction in progress, please retry")
        }
        TransactWriteItemsError::ResourceNotFoundException(_) => {
            StorageError::Backend(TABLE_NOT_FOUND.to_string())
        }
        TransactWriteItemsError::ProvisionedThroughputExceededException(_) => {
            transient(THROUGHPUT_EXCEEDED)
        }
        TransactWriteItemsError::RequestLimitExceeded(_) => transient(REQUEST_LIMIT_EXCEEDED),
        TransactWriteItemsError::InternalServerError(_) => transient(INTERNAL_SERVER_ERROR),
        err => StorageError::Backend(format!("TransactWriteItems failed: {:?}", err)),
    }
}

/// Turn per-operation cancellation codes into a storage error.
///
/// A failed condition wins over conflicts and throttling: it reports the
/// index of the offending operation so callers can map it to a domain error.
pub fn map_cancellation_reasons(reasons: &[CancellationReason]) -> StorageError {
    let codes: Vec<&str> = reasons
        .iter()
        .map(|reason| reason.code().unwrap_or("None"))
        .collect();
    cancellation_from_codes(&codes)
}

fn cancellation_from_codes(codes: &[&str]) -> StorageError {
    if let Some(index) = codes.iter().position(|code| *code == "ConditionalCheckFailed") {
        return StorageError::TransactionCanceled {
            failed_index: Some(index),
            reason: format!("ConditionalCheckFailed at operation {index}"),
        };
    }

    let retryable = codes.iter().any(|code| {
        matches!(
            *code,
            "TransactionConflict" | "ThrottlingError" | "ProvisionedThroughputExceeded"
        )
    });
    if retryable {
        return StorageError::Transient(format!("Transaction canceled: {}", codes.join(", ")));
    }

    StorageError::TransactionCanceled {
        failed_index: None,
        reason: codes.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_failure_reports_index() {
        let error = cancellation_from_codes(&["None", "ConditionalCheckFailed", "None"]);
        assert_eq!(
            error,
            StorageError::TransactionCanceled {
                failed_index: Some(1),
                reason: "ConditionalCheckFailed at operation 1".to_string(),
            }
        );
    }

    #[test]
    fn test_transaction_conflict_is_transient() {
        let error = cancellation_from_codes(&["None", "TransactionConflict"]);
        assert!(error.is_transient());
    }

    #[test]
    fn test_condition_failure_wins_over_conflict() {
        let error = cancellation_from_codes(&["TransactionConflict", "ConditionalCheckFailed"]);
        assert!(error.is_conflict());
    }

    #[test]
    fn test_validation_error_is_not_retried() {
        let error = cancellation_from_codes(&["ValidationError"]);
        assert_eq!(
            error,
            StorageError::TransactionCanceled {
                failed_index: None,
                reason: "ValidationError".to_string(),
            }
        );
    }
}
