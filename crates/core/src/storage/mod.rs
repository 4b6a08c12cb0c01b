mod classify;
mod error;
mod traits;
mod types;

pub use classify::{classify, classify_storage, ErrorClass};
pub use error::{RepositoryError, Result, StorageError, StorageResult};
pub use traits::StorageEngine;
pub use types::{
    Page, PageToken, QueryRequest, ReadConsistency, TransactOp, MAX_TRANSACT_ITEMS,
};
