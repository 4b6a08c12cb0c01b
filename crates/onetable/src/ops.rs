//! Transaction operation builders.
//!
//! Pure constructors for the [`TransactOp`]s that repositories hand to the
//! coordinator. Each builder carries the same condition as the matching
//! single-item operation on [`crate::Table`], so an operation behaves the same
//! inside and outside a transaction.

use onetable_core::entities::Entity;
use onetable_core::expression::{Condition, Update};
use onetable_core::item::Item;
use onetable_core::keys::Key;
use onetable_core::storage::{Result, TransactOp};

/// Creates `entity`, failing if its key is taken.
pub fn add<E: Entity>(entity: &E) -> Result<TransactOp> {
    Ok(TransactOp::Put {
        item: entity.to_item()?,
        condition: Some(Condition::item_not_exists()),
    })
}

/// Writes `entity`, replacing whatever is stored at its key.
pub fn put<E: Entity>(entity: &E) -> Result<TransactOp> {
    Ok(TransactOp::Put {
        item: entity.to_item()?,
        condition: None,
    })
}

/// Writes `entity` over the item read as `snapshot`, failing if the stored
/// item changed since.
pub fn replace<E: Entity>(entity: &E, snapshot: &Item) -> Result<TransactOp> {
    Ok(TransactOp::Put {
        item: entity.to_item()?,
        condition: Some(unchanged_since(snapshot)),
    })
}

/// Deletes `key`, failing unless it still holds `snapshot`.
pub fn delete_unchanged(key: Key, snapshot: &Item) -> TransactOp {
    TransactOp::Delete {
        key,
        condition: Some(unchanged_since(snapshot)),
    }
}

/// Deletes `key`, tolerating absence.
pub fn delete(key: Key) -> TransactOp {
    TransactOp::Delete {
        key,
        condition: None,
    }
}

/// Deletes `key`, failing if it is absent.
pub fn delete_existing(key: Key) -> TransactOp {
    TransactOp::Delete {
        key,
        condition: Some(Condition::item_exists()),
    }
}

/// Applies `update` to an existing item.
pub fn update_existing(key: Key, update: Update) -> TransactOp {
    TransactOp::Update {
        key,
        update,
        condition: Some(Condition::item_exists()),
    }
}

/// Applies `update` when `condition` holds.
pub fn update_if(key: Key, update: Update, condition: Condition) -> TransactOp {
    TransactOp::Update {
        key,
        update,
        condition: Some(condition),
    }
}

/// Adds `by` to a counter of an existing item.
pub fn increment(key: Key, field: &str, by: i64) -> TransactOp {
    update_existing(key, Update::new().add(field, by))
}

/// Subtracts `by` from a counter of an existing item, failing rather than
/// going below zero.
pub fn decrement(key: Key, field: &str, by: i64) -> TransactOp {
    TransactOp::Update {
        key,
        update: Update::new().add(field, -by),
        condition: Some(decrement_guard(field, by)),
    }
}

/// Asserts `condition` on `key` without writing.
pub fn check(key: Key, condition: Condition) -> TransactOp {
    TransactOp::ConditionCheck { key, condition }
}

/// Asserts that `key` exists.
pub fn check_exists(key: Key) -> TransactOp {
    check(key, Condition::item_exists())
}

/// The item exists and `field >= by`.
pub fn decrement_guard(field: &str, by: i64) -> Condition {
    Condition::item_exists().and(Condition::ge(field, by))
}

/// Every attribute of `snapshot` still holds its read value.
pub fn unchanged_since(snapshot: &Item) -> Condition {
    snapshot
        .iter()
        .fold(Condition::item_exists(), |condition, (name, value)| {
            condition.and(Condition::eq(name.clone(), value.clone()))
        })
}
