use onetable_core::entities::Card;
use onetable_core::expression::KeyCondition;
use onetable_core::keys::{self, IndexSlot, KeyPrefix};
use onetable_core::storage::{QueryRequest, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `Card` items.
#[derive(Debug, Clone)]
pub struct CardRepository {
    table: Table,
}

impl CardRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, card_id: &str) -> Result<Option<Card>> {
        self.table.get(&keys::card_key(card_id)).await
    }

    pub async fn get_consistent(&self, card_id: &str) -> Result<Option<Card>> {
        self.table.get_consistent(&keys::card_key(card_id)).await
    }

    /// Cards of a user, newest first.
    pub fn generate_by_user(&self, user_id: &str) -> ResultStream<Card> {
        let condition = KeyCondition::partition(keys::user_partition(user_id))
            .begins_with(KeyPrefix::Card.begins_with());
        self.table
            .generate(QueryRequest::index(IndexSlot::A1, condition).reverse())
    }

    /// Cards about a post, one per user.
    pub fn generate_by_post(&self, post_id: &str) -> ResultStream<Card> {
        let condition = KeyCondition::partition(keys::post_cards_partition(post_id));
        self.table.generate(QueryRequest::index(IndexSlot::K1, condition))
    }

    pub fn add_op(card: &Card) -> Result<TransactOp> {
        ops::add(card)
    }

    pub fn delete_existing_op(card_id: &str) -> TransactOp {
        ops::delete_existing(keys::card_key(card_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;

    #[tokio::test]
    async fn test_cards_by_user_and_post() {
        let table = Table::new(InMemoryEngine::new());
        let repo = CardRepository::new(table.clone());
        table
            .add(Card::new("u1", "New follower", "open").with_id("c1"))
            .await
            .unwrap();
        table
            .add(Card::new("u1", "Comment", "view").with_id("c2").for_post("p1"))
            .await
            .unwrap();

        let for_user = collect_all(repo.generate_by_user("u1")).await.unwrap();
        let for_post = collect_all(repo.generate_by_post("p1")).await.unwrap();

        assert_eq!(for_user.len(), 2);
        assert_eq!(for_post.len(), 1);
        assert_eq!(for_post[0].card_id, "c2");
    }
}
