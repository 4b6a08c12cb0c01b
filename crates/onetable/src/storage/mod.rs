//! Storage engine implementations.
//!
//! The engine contract lives in `onetable_core::storage`. This module
//! provides the engines themselves and the retry decorator that wraps them.
//!
//! # Feature Flags
//!
//! - always available: [`inmemory::InMemoryEngine`]
//! - `dynamodb`: AWS DynamoDB engine using `aws-sdk-dynamodb`
//!
//! ```bash
//! cargo build -p onetable --features dynamodb
//! ```

pub mod inmemory;
mod retry;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

pub use inmemory::InMemoryEngine;
pub use retry::{with_retry, RetryConfig, RetryingEngine};

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbEngine;
