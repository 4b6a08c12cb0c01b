use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Entity;
use crate::keys::{self, IndexKey, ItemKind, ItemRef, Key};
use crate::timestamp;

/// Trending score of an item, indexed by kind in descending score order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trending {
    pub item_kind: ItemKind,
    pub item_id: String,
    pub score: f64,
    #[serde(with = "crate::timestamp::required")]
    pub last_deflated_at: DateTime<Utc>,
}

impl Trending {
    pub const SCORE: &'static str = "score";
    pub const LAST_DEFLATED_AT: &'static str = "lastDeflatedAt";

    pub fn new(item: &ItemRef, score: f64) -> Self {
        Self {
            item_kind: item.kind,
            item_id: item.id.clone(),
            score,
            last_deflated_at: timestamp::now(),
        }
    }

    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.item_kind, self.item_id.clone())
    }
}

impl Entity for Trending {
    const ENTITY_TYPE: &'static str = "Trending";

    fn key(&self) -> Key {
        keys::trending_key(&self.item())
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![keys::trending_k3(self.item_kind, self.score)]
    }
}
