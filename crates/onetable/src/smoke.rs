//! End-to-end checks run by `onetable smoke`.
//!
//! Every run uses fresh ids, so it is safe against a shared table.

use anyhow::{bail, ensure, Context, Result};
use chrono::Duration;
use uuid::Uuid;

use onetable::coordinator::Coordinator;
use onetable::storage::{InMemoryEngine, RetryingEngine};
use onetable::{Config, Table};
use onetable_core::entities::{ChatMember, Flag, User, View};
use onetable_core::keys::ItemRef;
use onetable_core::storage::RepositoryError;
use onetable_core::timestamp;

use crate::Backend;

/// Builds a table over the selected engine, wrapped in the retry decorator.
pub async fn build_table(backend: Backend, config: &Config) -> Result<Table> {
    match backend {
        Backend::Inmemory => {
            let mut engine = InMemoryEngine::new().with_max_transact_items(config.transact_max_items);
            if let Some(page_size) = config.query_page_size {
                engine = engine.with_page_size(page_size);
            }
            Ok(Table::new(RetryingEngine::new(engine, config.retry())))
        }
        #[cfg(feature = "dynamodb")]
        Backend::Dynamodb => {
            let engine = onetable::storage::DynamoDbEngine::from_config(config).await;
            engine
                .ensure_table(&onetable::schema::table_definition(&config.table_name))
                .await
                .context("failed to prepare DynamoDB table")?;
            Ok(Table::new(RetryingEngine::new(engine, config.retry())))
        }
        #[cfg(not(feature = "dynamodb"))]
        Backend::Dynamodb => bail!("the dynamodb backend requires the `dynamodb` feature"),
    }
}

pub async fn run(table: Table) -> Result<()> {
    let coordinator = Coordinator::new(table);

    unviewed_count(&coordinator).await.context("chat member scenario")?;
    tracing::info!("chat member scenario passed");

    repeated_flag(&coordinator).await.context("flag scenario")?;
    tracing::info!("flag scenario passed");

    Ok(())
}

fn fresh(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

/// Two messages raise the member's counter; a later view clears it.
async fn unviewed_count(coordinator: &Coordinator) -> Result<()> {
    let chat_id = fresh("chat");
    let user = coordinator.users().add(User::new(fresh("smoke")).with_id(fresh("user"))).await?;
    let members = coordinator.chat_members();

    members.add(ChatMember::new(&chat_id, &user.user_id)).await?;
    let member = members
        .get_consistent(&chat_id, &user.user_id)
        .await?
        .context("member missing after add")?;
    ensure!(
        member.messages_unviewed_count.is_none(),
        "new member has an unviewed count"
    );

    members.increment_messages_unviewed_count(&chat_id, &user.user_id).await?;
    let member = members.increment_messages_unviewed_count(&chat_id, &user.user_id).await?;
    ensure!(
        member.messages_unviewed_count == Some(2),
        "expected 2 unviewed messages, got {:?}",
        member.messages_unviewed_count
    );

    let viewed_at = member.last_message_activity_at + Duration::seconds(1);
    coordinator
        .views()
        .add(View::new(&ItemRef::chat(&chat_id), &user.user_id, 1, viewed_at))
        .await?;
    let cleared = coordinator.sync_messages_unviewed_count(&chat_id, &user.user_id).await?;
    ensure!(cleared, "sync did not clear the counter");

    let member = members
        .get_consistent(&chat_id, &user.user_id)
        .await?
        .context("member missing after sync")?;
    ensure!(
        member.messages_unviewed_count == Some(0),
        "expected 0 unviewed messages, got {:?}",
        member.messages_unviewed_count
    );
    tracing::debug!(chat_id, at = %timestamp::format(viewed_at), "unviewed count cleared");
    Ok(())
}

/// A second flag by the same user is rejected and leaves the first intact.
async fn repeated_flag(coordinator: &Coordinator) -> Result<()> {
    let post = ItemRef::post(fresh("post"));
    let user_id = fresh("user");
    let flags = coordinator.flags();

    let original = flags.add(Flag::new(&post, &user_id)).await?;
    ensure!(
        flags.get_consistent(&post, &user_id).await?.as_ref() == Some(&original),
        "flag not readable after add"
    );

    match flags.add(Flag::new(&post, &user_id)).await {
        Err(RepositoryError::AlreadyFlagged { .. }) => {}
        Ok(_) => bail!("second flag was accepted"),
        Err(err) => return Err(err).context("second flag failed with the wrong error"),
    }

    let stored = flags.get_consistent(&post, &user_id).await?;
    ensure!(stored.as_ref() == Some(&original), "original flag changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scenarios_pass_on_inmemory() {
        let table = build_table(Backend::Inmemory, &Config::default()).await.unwrap();
        run(table).await.unwrap();
    }
}
