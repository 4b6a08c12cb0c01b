//! Lazy, restartable sequences over paged queries.
//!
//! [`paginate`] turns a [`QueryRequest`] into a stream of items and hides the
//! continuation tokens: the stream requests the next page until the engine
//! returns a page without a token. Page sizes are whatever the engine
//! returns, so callers never depend on them. Restarting means building a new
//! stream, which re-queries from the first page.
//!
//! The first error ends the stream after being yielded.

use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::{Stream, StreamExt};

use onetable_core::entities::Entity;
use onetable_core::item::Item;
use onetable_core::storage::{QueryRequest, Result, StorageEngine};

use crate::table::decode;

/// A boxed stream of query results.
pub type ResultStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// Streams every item matching `request`, following continuation tokens.
pub fn paginate(engine: Arc<dyn StorageEngine>, request: QueryRequest) -> ResultStream<Item> {
    let stream = async_stream::stream! {
        let mut request = request;
        let mut pages = 0usize;

        loop {
            let page = match engine.query(&request).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::debug!(pages, error = %err, "query page failed");
                    yield Err(err.into());
                    return;
                }
            };
            pages += 1;

            for item in page.items {
                yield Ok(item);
            }

            match page.next_token {
                Some(token) => request.start_token = Some(token),
                None => break,
            }
        }

        tracing::trace!(pages, "query exhausted");
    };

    Box::pin(stream)
}

/// Streams every item matching `request`, decoded as `E`.
pub fn paginate_entities<E: Entity>(
    engine: Arc<dyn StorageEngine>,
    request: QueryRequest,
) -> ResultStream<E> {
    Box::pin(paginate(engine, request).map(|item| item.and_then(decode::<E>)))
}

/// Drains a stream into a vector, stopping at the first error.
pub async fn collect_all<T>(mut stream: ResultStream<T>) -> Result<Vec<T>> {
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use onetable_core::expression::KeyCondition;
    use onetable_core::keys::Key;

    use super::*;
    use crate::storage::InMemoryEngine;

    async fn seeded(page_size: usize, count: usize) -> Arc<dyn StorageEngine> {
        let engine = InMemoryEngine::new().with_page_size(page_size);
        for i in 0..count {
            let item = Key::new("chat/c1", format!("member/u{i:03}")).to_item();
            engine.put(&item, None).await.unwrap();
        }
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_paginate_yields_every_item_once() {
        for page_size in [1, 3, 7, 10, 50] {
            let engine = seeded(page_size, 23).await;
            let request = QueryRequest::table(KeyCondition::partition("chat/c1"));

            let items = collect_all(paginate(engine, request)).await.unwrap();
            let mut sort_keys: Vec<_> = items
                .iter()
                .map(|item| Key::from_item(item).unwrap().sort_key)
                .collect();

            assert_eq!(sort_keys.len(), 23, "page size {page_size}");
            sort_keys.dedup();
            assert_eq!(sort_keys.len(), 23, "page size {page_size}");
        }
    }

    #[tokio::test]
    async fn test_paginate_empty_result() {
        let engine = seeded(5, 0).await;
        let request = QueryRequest::table(KeyCondition::partition("chat/c1"));

        let items = collect_all(paginate(engine, request)).await.unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_paginate_is_restartable() {
        let engine = seeded(4, 9).await;
        let request = QueryRequest::table(KeyCondition::partition("chat/c1"));

        let mut first = paginate(engine.clone(), request.clone());
        let partial = first.next().await.unwrap().unwrap();
        drop(first);

        let all = collect_all(paginate(engine, request)).await.unwrap();
        assert_eq!(all.len(), 9);
        assert_eq!(all[0], partial);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let engine = seeded(4, 3).await;
        // Strong reads are rejected on indexes.
        let request = QueryRequest::index(
            onetable_core::keys::IndexSlot::K1,
            KeyCondition::partition("chat/c1"),
        )
        .consistent();

        let mut stream = paginate(engine, request);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
