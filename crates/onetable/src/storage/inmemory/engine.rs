//! In-memory storage engine.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use onetable_core::expression::{Condition, Update};
use onetable_core::item::{project, AttributeValue, Item};
use onetable_core::keys::{Key, PARTITION_KEY, SORT_KEY};
use onetable_core::storage::{
    Page, PageToken, QueryRequest, ReadConsistency, StorageEngine, StorageError, StorageResult,
    TransactOp, MAX_TRANSACT_ITEMS,
};

/// In-memory storage engine for tests and local runs.
///
/// Items live in a `BTreeMap` keyed by primary key behind an
/// `Arc<RwLock<_>>`, so clones share the same table. Every write takes the
/// write lock for its whole evaluate-then-apply step, which makes conditions
/// and transactions atomic. Data is lost when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct InMemoryEngine {
    items: Arc<RwLock<BTreeMap<Key, Item>>>,
    page_size: Option<usize>,
    max_transact_items: usize,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Creates a new empty engine.
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(BTreeMap::new())),
            page_size: None,
            max_transact_items: MAX_TRANSACT_ITEMS,
        }
    }

    /// Caps every query page, so callers see continuation tokens.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Lowers the transaction size bound.
    pub fn with_max_transact_items(mut self, max: usize) -> Self {
        self.max_transact_items = max.clamp(1, MAX_TRANSACT_ITEMS);
        self
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

fn require_key(item: &Item) -> StorageResult<Key> {
    Key::from_item(item)
        .ok_or_else(|| StorageError::InvalidRequest("item has no string primary key".to_string()))
}

fn check(condition: Option<&Condition>, current: Option<&Item>, key: &Key) -> StorageResult<()> {
    match condition {
        Some(condition) if !condition.evaluate(current) => {
            Err(StorageError::ConditionFailed { key: key.clone() })
        }
        _ => Ok(()),
    }
}

fn apply_update(key: &Key, current: Option<&Item>, update: &Update) -> StorageResult<Item> {
    let mut item = current.cloned().unwrap_or_else(|| key.to_item());
    update.apply(&mut item)?;
    Ok(item)
}

/// Position of an item in query order.
struct Position<'a> {
    sort_key: Option<&'a AttributeValue>,
    key: Key,
}

impl Position<'_> {
    fn cmp(&self, other: &Position<'_>) -> Ordering {
        let by_sort_key = match (self.sort_key, other.sort_key) {
            (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        by_sort_key.then_with(|| self.key.cmp(&other.key))
    }
}

#[async_trait]
impl StorageEngine for InMemoryEngine {
    async fn get(&self, key: &Key, _consistency: ReadConsistency) -> StorageResult<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.get(key).cloned())
    }

    async fn put(&self, item: &Item, condition: Option<&Condition>) -> StorageResult<()> {
        let key = require_key(item)?;
        let mut items = self.items.write().await;
        check(condition, items.get(&key), &key)?;
        tracing::trace!(key = %key, "put item");
        items.insert(key, item.clone());
        Ok(())
    }

    async fn update(
        &self,
        key: &Key,
        update: &Update,
        condition: Option<&Condition>,
    ) -> StorageResult<Item> {
        let mut items = self.items.write().await;
        let current = items.get(key);
        check(condition, current, key)?;
        let updated = apply_update(key, current, update)?;
        tracing::trace!(key = %key, "updated item");
        items.insert(key.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete(&self, key: &Key, condition: Option<&Condition>) -> StorageResult<Option<Item>> {
        let mut items = self.items.write().await;
        check(condition, items.get(key), key)?;
        let removed = items.remove(key);
        tracing::trace!(key = %key, removed = removed.is_some(), "delete item");
        Ok(removed)
    }

    async fn transact_write(&self, ops: &[TransactOp]) -> StorageResult<()> {
        if ops.len() > self.max_transact_items {
            return Err(StorageError::TransactionTooLarge {
                size: ops.len(),
                max: self.max_transact_items,
            });
        }

        let mut keys = Vec::with_capacity(ops.len());
        let mut seen = HashSet::with_capacity(ops.len());
        for op in ops {
            let key = op.key()?;
            if !seen.insert(key.clone()) {
                return Err(StorageError::DuplicateTransactionKey { key });
            }
            keys.push(key);
        }

        let mut items = self.items.write().await;

        for (index, (op, key)) in ops.iter().zip(&keys).enumerate() {
            if let Some(condition) = op.condition() {
                if !condition.evaluate(items.get(key)) {
                    tracing::debug!(key = %key, index, op = op.kind(), "transaction condition failed");
                    return Err(StorageError::TransactionCanceled {
                        failed_index: Some(index),
                        reason: format!("ConditionalCheckFailed on {key}"),
                    });
                }
            }
        }

        // Stage every write before touching the map so a bad update leaves
        // nothing applied.
        let mut staged: Vec<(Key, Option<Item>)> = Vec::with_capacity(ops.len());
        for (op, key) in ops.iter().zip(&keys) {
            match op {
                TransactOp::Put { item, .. } => staged.push((key.clone(), Some(item.clone()))),
                TransactOp::Update { update, .. } => {
                    staged.push((key.clone(), Some(apply_update(key, items.get(key), update)?)));
                }
                TransactOp::Delete { .. } => staged.push((key.clone(), None)),
                TransactOp::ConditionCheck { .. } => {}
            }
        }

        for (key, item) in staged {
            match item {
                Some(item) => {
                    items.insert(key, item);
                }
                None => {
                    items.remove(&key);
                }
            }
        }
        tracing::trace!(operations = ops.len(), "transaction committed");
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> StorageResult<Page> {
        if request.index.is_some() && request.consistency == ReadConsistency::Strong {
            return Err(StorageError::InvalidRequest(
                "consistent reads are not supported on indexes".to_string(),
            ));
        }

        let (pk_attr, sk_attr) = match request.index {
            Some(slot) => (slot.partition_key_attr(), slot.sort_key_attr()),
            None => (PARTITION_KEY, SORT_KEY),
        };

        let items = self.items.read().await;

        let mut matches: Vec<(Position<'_>, &Item)> = items
            .iter()
            .filter_map(|(key, item)| {
                let partition_key = item.get(pk_attr)?.as_s()?;
                let sort_key = item.get(sk_attr);
                if request.index.is_some() && sort_key.is_none() {
                    return None;
                }
                request
                    .key_condition
                    .matches(partition_key, sort_key)
                    .then(|| {
                        (
                            Position {
                                sort_key,
                                key: key.clone(),
                            },
                            item,
                        )
                    })
            })
            .collect();

        matches.sort_by(|(a, _), (b, _)| a.cmp(b));
        if !request.scan_forward {
            matches.reverse();
        }

        let start = match &request.start_token {
            Some(PageToken(token)) => {
                let after = Position {
                    sort_key: token.get(sk_attr),
                    key: require_key(token)?,
                };
                let wanted = if request.scan_forward {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
                matches
                    .iter()
                    .position(|(position, _)| position.cmp(&after) == wanted)
                    .unwrap_or(matches.len())
            }
            None => 0,
        };

        let page_size = match (request.limit, self.page_size) {
            (Some(limit), Some(page)) => limit.min(page),
            (Some(limit), None) => limit,
            (None, Some(page)) => page,
            (None, None) => usize::MAX,
        }
        .max(1);

        let evaluated = &matches[start..];
        let taken = evaluated.len().min(page_size);
        let page = &evaluated[..taken];

        let next_token = if taken < evaluated.len() {
            page.last().map(|(position, item)| {
                let mut token = position.key.to_item();
                if let Some(value) = item.get(pk_attr) {
                    token.insert(pk_attr.to_string(), value.clone());
                }
                if let Some(value) = item.get(sk_attr) {
                    token.insert(sk_attr.to_string(), value.clone());
                }
                PageToken(token)
            })
        } else {
            None
        };

        let items = page
            .iter()
            .filter(|(_, item)| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|filter| filter.evaluate(Some(*item)))
            })
            .map(|(_, item)| match &request.projection {
                Some(attributes) => project(item, attributes),
                None => (*item).clone(),
            })
            .collect();

        Ok(Page { items, next_token })
    }

    async fn batch_get(&self, keys: &[Key], projection: Option<&[String]>) -> StorageResult<Vec<Item>> {
        let items = self.items.read().await;
        let mut seen = HashSet::with_capacity(keys.len());
        Ok(keys
            .iter()
            .filter(|key| seen.insert(*key))
            .filter_map(|key| items.get(key))
            .map(|item| match projection {
                Some(attributes) => project(item, attributes),
                None => item.clone(),
            })
            .collect())
    }

    fn max_transact_items(&self) -> usize {
        self.max_transact_items
    }
}
