use std::fmt;
use std::str::FromStr;

use crate::expression::{Condition, KeyCondition, Update};
use crate::item::Item;
use crate::keys::{IndexSlot, Key};

use super::StorageError;

/// Default upper bound on operations in one transaction.
pub const MAX_TRANSACT_ITEMS: usize = 25;

/// Read consistency of a get or query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadConsistency {
    #[default]
    Eventual,
    /// Linearizable read. Only valid against the table, not an index.
    Strong,
}

/// Opaque continuation token: the last evaluated key of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageToken(pub Item);

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl FromStr for PageToken {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
            .map(PageToken)
            .map_err(|e| StorageError::InvalidRequest(format!("malformed page token: {e}")))
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    /// `None` on the last page.
    pub next_token: Option<PageToken>,
}

/// A query against the table or one index slot.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub index: Option<IndexSlot>,
    pub key_condition: KeyCondition,
    pub filter: Option<Condition>,
    pub scan_forward: bool,
    pub limit: Option<usize>,
    pub projection: Option<Vec<String>>,
    pub consistency: ReadConsistency,
    pub start_token: Option<PageToken>,
}

impl QueryRequest {
    /// Query the table's primary key.
    pub fn table(key_condition: KeyCondition) -> Self {
        Self {
            index: None,
            key_condition,
            filter: None,
            scan_forward: true,
            limit: None,
            projection: None,
            consistency: ReadConsistency::Eventual,
            start_token: None,
        }
    }

    /// Query an index slot.
    pub fn index(slot: IndexSlot, key_condition: KeyCondition) -> Self {
        Self {
            index: Some(slot),
            ..Self::table(key_condition)
        }
    }

    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Descending sort key order.
    pub fn reverse(mut self) -> Self {
        self.scan_forward = false;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project(mut self, attributes: &[&str]) -> Self {
        self.projection = Some(attributes.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn consistent(mut self) -> Self {
        self.consistency = ReadConsistency::Strong;
        self
    }

    pub fn starting_after(mut self, token: Option<PageToken>) -> Self {
        self.start_token = token;
        self
    }
}

/// One operation of a `transact_write`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactOp {
    Put {
        item: Item,
        condition: Option<Condition>,
    },
    Update {
        key: Key,
        update: Update,
        condition: Option<Condition>,
    },
    Delete {
        key: Key,
        condition: Option<Condition>,
    },
    /// Asserts a condition without writing.
    ConditionCheck { key: Key, condition: Condition },
}

impl TransactOp {
    /// The key the operation touches.
    pub fn key(&self) -> Result<Key, StorageError> {
        match self {
            TransactOp::Put { item, .. } => Key::from_item(item)
                .ok_or_else(|| StorageError::InvalidRequest("put item has no primary key".to_string())),
            TransactOp::Update { key, .. }
            | TransactOp::Delete { key, .. }
            | TransactOp::ConditionCheck { key, .. } => Ok(key.clone()),
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            TransactOp::Put { condition, .. }
            | TransactOp::Update { condition, .. }
            | TransactOp::Delete { condition, .. } => condition.as_ref(),
            TransactOp::ConditionCheck { condition, .. } => Some(condition),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TransactOp::Put { .. } => "put",
            TransactOp::Update { .. } => "update",
            TransactOp::Delete { .. } => "delete",
            TransactOp::ConditionCheck { .. } => "condition_check",
        }
    }
}
