//! Retry decorator for transient storage failures.
//!
//! [`RetryingEngine`] wraps any [`StorageEngine`] and retries calls that fail
//! with [`StorageError::Transient`] (throttling, timeouts, dropped
//! connections). Condition failures and every other error are returned on
//! the first attempt. When the attempts run out the last transient error is
//! surfaced as [`StorageError::RetriesExhausted`].
//!
//! Delays double with each attempt starting at `base_delay`, are capped at
//! `max_delay`, and get 0-50% random jitter on top.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use onetable_core::expression::{Condition, Update};
use onetable_core::item::Item;
use onetable_core::keys::Key;
use onetable_core::storage::{
    Page, QueryRequest, ReadConsistency, StorageEngine, StorageError, StorageResult, TransactOp,
};

/// Backoff settings for [`RetryingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(2_000),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        let jitter_range = delay.as_millis() as u64 / 2;
        if jitter_range > 0 {
            delay + Duration::from_millis(rand::rng().random_range(0..=jitter_range))
        } else {
            delay
        }
    }
}

/// Runs `operation` until it succeeds, fails for a non-transient reason or
/// runs out of attempts.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation_name: &'static str, mut operation: F) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let delay = config.backoff_with_jitter(attempt);
                tracing::debug!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    operation = operation_name,
                    attempts = max_attempts,
                    error = %err,
                    "retries exhausted"
                );
                return Err(StorageError::RetriesExhausted {
                    operation: operation_name,
                    attempts: max_attempts,
                    last_error: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
}

/// Storage engine decorator adding bounded retries with backoff.
///
/// # Type Parameters
///
/// * `E` - The wrapped engine
pub struct RetryingEngine<E: StorageEngine> {
    inner: E,
    config: RetryConfig,
}

impl<E: StorageEngine> RetryingEngine<E> {
    pub fn new(inner: E, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: StorageEngine + 'static> StorageEngine for RetryingEngine<E> {
    async fn get(&self, key: &Key, consistency: ReadConsistency) -> StorageResult<Option<Item>> {
        with_retry(&self.config, "get", move || self.inner.get(key, consistency)).await
    }

    async fn put(&self, item: &Item, condition: Option<&Condition>) -> StorageResult<()> {
        with_retry(&self.config, "put", move || self.inner.put(item, condition)).await
    }

    async fn update(
        &self,
        key: &Key,
        update: &Update,
        condition: Option<&Condition>,
    ) -> StorageResult<Item> {
        with_retry(&self.config, "update", move || {
            self.inner.update(key, update, condition)
        })
        .await
    }

    async fn delete(&self, key: &Key, condition: Option<&Condition>) -> StorageResult<Option<Item>> {
        with_retry(&self.config, "delete", move || self.inner.delete(key, condition)).await
    }

    async fn transact_write(&self, ops: &[TransactOp]) -> StorageResult<()> {
        with_retry(&self.config, "transact_write", move || {
            self.inner.transact_write(ops)
        })
        .await
    }

    async fn query(&self, request: &QueryRequest) -> StorageResult<Page> {
        with_retry(&self.config, "query", move || self.inner.query(request)).await
    }

    async fn batch_get(&self, keys: &[Key], projection: Option<&[String]>) -> StorageResult<Vec<Item>> {
        with_retry(&self.config, "batch_get", move || {
            self.inner.batch_get(keys, projection)
        })
        .await
    }

    fn max_transact_items(&self) -> usize {
        self.inner.max_transact_items()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::storage::inmemory::InMemoryEngine;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(config.backoff(0), Duration::from_millis(100));
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(2), Duration::from_millis(400));
        assert_eq!(config.backoff(3), Duration::from_millis(500));
        assert_eq!(config.backoff(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(&fast(), "get", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StorageError::Transient("throttled".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_fatal() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: StorageResult<()> = with_retry(&fast(), "put", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::Transient("timeout".to_string())) }
        })
        .await;

        assert_eq!(
            result,
            Err(StorageError::RetriesExhausted {
                operation: "put",
                attempts: 3,
                last_error: "Transient failure: timeout".to_string(),
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_condition_failures_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: StorageResult<()> = with_retry(&fast(), "put", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(StorageError::ConditionFailed {
                    key: Key::new("post/p1", "-"),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(StorageError::ConditionFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_decorator_passes_through() {
        let engine = RetryingEngine::new(InMemoryEngine::new().with_max_transact_items(10), fast());
        let item = Key::new("post/p1", "-").to_item();

        engine.put(&item, Some(&Condition::item_not_exists())).await.unwrap();
        let fetched = engine
            .get(&Key::new("post/p1", "-"), ReadConsistency::Eventual)
            .await
            .unwrap();

        assert_eq!(fetched, Some(item));
        assert_eq!(engine.max_transact_items(), 10);
    }
}
