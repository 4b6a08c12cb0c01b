use onetable_core::entities::Flag;
use onetable_core::expression::KeyCondition;
use onetable_core::keys::{self, IndexSlot, ItemKind, ItemRef, KeyPrefix};
use onetable_core::storage::{QueryRequest, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `Flag` items. Flags live in the flagged item's partition.
#[derive(Debug, Clone)]
pub struct FlagRepository {
    table: Table,
}

impl FlagRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, item: &ItemRef, user_id: &str) -> Result<Option<Flag>> {
        self.table.get(&keys::flag_key(item, user_id)).await
    }

    pub async fn get_consistent(&self, item: &ItemRef, user_id: &str) -> Result<Option<Flag>> {
        self.table.get_consistent(&keys::flag_key(item, user_id)).await
    }

    /// Creates the flag; flagging twice fails with `AlreadyFlagged`.
    pub async fn add(&self, flag: Flag) -> Result<Flag> {
        self.table.add(flag).await
    }

    /// Removes the flag; fails with `NotFlagged` when there is none.
    pub async fn delete(&self, item: &ItemRef, user_id: &str) -> Result<Flag> {
        self.table
            .delete_existing(&keys::flag_key(item, user_id))
            .await
    }

    /// Flags on one item.
    pub fn generate_by_item(&self, item: &ItemRef) -> ResultStream<Flag> {
        let condition = KeyCondition::partition(item.partition_key())
            .begins_with(KeyPrefix::Flag.begins_with());
        self.table.generate(QueryRequest::table(condition))
    }

    /// Flags raised by a user, oldest first, optionally of one item kind.
    pub fn generate_by_user(&self, user_id: &str, kind: Option<ItemKind>) -> ResultStream<Flag> {
        let mut condition = KeyCondition::partition(keys::flags_by_user_partition(user_id));
        if let Some(kind) = kind {
            condition = condition.begins_with(keys::item_kind_prefix(kind));
        }
        self.table.generate(QueryRequest::index(IndexSlot::K1, condition))
    }

    pub fn add_op(flag: &Flag) -> Result<TransactOp> {
        ops::add(flag)
    }

    pub fn delete_existing_op(item: &ItemRef, user_id: &str) -> TransactOp {
        ops::delete_existing(keys::flag_key(item, user_id))
    }
}
