use onetable_core::entities::FirstStory;
use onetable_core::expression::KeyCondition;
use onetable_core::keys::{self, IndexSlot};
use onetable_core::storage::{QueryRequest, Result, TransactOp};

use crate::ops;
use crate::pagination::ResultStream;
use crate::table::Table;

/// Access to `FirstStory` items.
#[derive(Debug, Clone)]
pub struct FirstStoryRepository {
    table: Table,
}

impl FirstStoryRepository {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub async fn get(&self, posted_by_user_id: &str, follower_user_id: &str) -> Result<Option<FirstStory>> {
        self.table
            .get(&keys::first_story_key(posted_by_user_id, follower_user_id))
            .await
    }

    /// Writes the story pointer, replacing any previous one.
    pub async fn put(&self, story: &FirstStory) -> Result<()> {
        self.table.put(story).await
    }

    pub async fn delete(&self, posted_by_user_id: &str, follower_user_id: &str) -> Result<Option<FirstStory>> {
        self.table
            .delete(&keys::first_story_key(posted_by_user_id, follower_user_id))
            .await
    }

    /// First stories visible to a follower, soonest expiry first.
    pub fn generate_by_follower(&self, follower_user_id: &str) -> ResultStream<FirstStory> {
        let condition = KeyCondition::partition(keys::first_stories_partition(follower_user_id));
        self.table.generate(QueryRequest::index(IndexSlot::A1, condition))
    }

    pub fn delete_op(posted_by_user_id: &str, follower_user_id: &str) -> TransactOp {
        ops::delete(keys::first_story_key(posted_by_user_id, follower_user_id))
    }
}
