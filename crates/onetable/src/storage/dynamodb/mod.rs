//! DynamoDB storage engine.
//!
//! Enabled with the `dynamodb` feature. Implements
//! [`onetable_core::storage::StorageEngine`] using `aws-sdk-dynamodb`.
//!
//! ```bash
//! cargo build -p onetable --features dynamodb
//! ```

mod conversions;
mod engine;
mod error;

pub use engine::DynamoDbEngine;
