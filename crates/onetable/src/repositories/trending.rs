use onetable_core::entities::Trending;
use onetable_core::expression::{Condition, KeyCondition, Update};
use onetable_core::item::AttributeValue;
use onetable_core::keys::{self, IndexSlot, ItemKind, ItemRef};
use onetable_core::storage::{QueryRequest, RepositoryError, Result};
use onetable_core::timestamp;

use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `Trending` items.
#[derive(Debug, Clone)]
pub struct TrendingRepository {
    table: Table,
}

impl TrendingRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, item: &ItemRef) -> Result<Option<Trending>> {
        self.table.get(&keys::trending_key(item)).await
    }

    /// Writes the score, replacing any previous one.
    pub async fn put(&self, trending: &Trending) -> Result<()> {
        self.table.put(trending).await
    }

    pub async fn delete(&self, item: &ItemRef) -> Result<Option<Trending>> {
        self.table.delete(&keys::trending_key(item)).await
    }

    /// Items of a kind by descending score, optionally above `min_score`.
    pub fn generate_by_kind(&self, kind: ItemKind, min_score: Option<f64>) -> ResultStream<Trending> {
        let mut condition = KeyCondition::partition(keys::trending_partition(kind));
        if let Some(min_score) = min_score {
            condition = condition.ge(AttributeValue::float(min_score));
        }
        self.table
            .generate(QueryRequest::index(IndexSlot::K3, condition).reverse())
    }

    /// Multiplies the score by `factor`.
    ///
    /// Compare-and-swap on `lastDeflatedAt`: returns `None` when another
    /// writer deflated or rewrote the score since it was read.
    pub async fn deflate(&self, item: &ItemRef, factor: f64) -> Result<Option<Trending>> {
        let key = keys::trending_key(item);
        let Some(current) = self.table.get_consistent::<Trending>(&key).await? else {
            return Ok(None);
        };

        let score = current.score * factor;
        let update = Update::new()
            .set(Trending::SCORE, AttributeValue::float(score))
            .set(Trending::LAST_DEFLATED_AT, timestamp::format(timestamp::now()))
            .set_index(&keys::trending_k3(item.kind, score));
        let condition = Condition::eq(
            Trending::LAST_DEFLATED_AT,
            timestamp::format(current.last_deflated_at),
        )
        .and(Condition::eq(Trending::SCORE, AttributeValue::float(current.score)));

        match self
            .table
            .update_if::<Trending>(&key, &update, condition, |key| RepositoryError::Conflict(key.to_string()))
            .await
        {
            Ok(trending) => Ok(Some(trending)),
            Err(RepositoryError::Conflict(_)) => {
                tracing::debug!(item = %item, "trending score changed during deflation, skipping");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::collect_all;
    use crate::storage::InMemoryEngine;

    fn repo() -> TrendingRepository {
        TrendingRepository::new(Table::new(InMemoryEngine::new()))
    }

    #[tokio::test]
    async fn test_generate_by_kind_descending_with_floor() {
        let repo = repo();
        repo.put(&Trending::new(&ItemRef::post("low"), 2.0)).await.unwrap();
        repo.put(&Trending::new(&ItemRef::post("high"), 10.5)).await.unwrap();
        repo.put(&Trending::new(&ItemRef::post("mid"), 9.0)).await.unwrap();
        repo.put(&Trending::new(&ItemRef::chat("c1"), 50.0)).await.unwrap();

        let all = collect_all(repo.generate_by_kind(ItemKind::Post, None)).await.unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.item_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);

        let hot = collect_all(repo.generate_by_kind(ItemKind::Post, Some(5.0)))
            .await
            .unwrap();
        assert_eq!(hot.len(), 2);
    }

    #[tokio::test]
    async fn test_deflate_rescales_and_reindexes() {
        let repo = repo();
        let post = ItemRef::post("p1");
        repo.put(&Trending::new(&post, 8.0)).await.unwrap();

        let deflated = repo.deflate(&post, 0.5).await.unwrap().unwrap();
        assert_eq!(deflated.score, 4.0);

        let hot = collect_all(repo.generate_by_kind(ItemKind::Post, Some(5.0)))
            .await
            .unwrap();
        assert!(hot.is_empty());
    }

    #[tokio::test]
    async fn test_deflate_missing_is_none() {
        assert!(repo().deflate(&ItemRef::post("p1"), 0.5).await.unwrap().is_none());
    }
}
