//! DynamoDB storage engine.
//!
//! Implements [`StorageEngine`] with `aws-sdk-dynamodb`. Typed conditions,
//! updates and key conditions are compiled into placeholder expressions by
//! `onetable_core::expression`; nothing user-provided is spliced into an
//! expression string.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, ConditionCheck, Delete, GlobalSecondaryIndex,
    KeySchemaElement, KeyType, KeysAndAttributes, Projection, ProjectionType, Put, ReturnValue,
    ScalarAttributeType, TableStatus, TransactWriteItem, Update as SdkUpdate,
};
use aws_sdk_dynamodb::Client;

use onetable_core::expression::{
    compile_condition, compile_key_condition, compile_projection, compile_update, Condition,
    ExpressionAttributes, Update,
};
use onetable_core::item::Item;
use onetable_core::keys::{Key, PARTITION_KEY, SORT_KEY};
use onetable_core::storage::{
    Page, PageToken, QueryRequest, ReadConsistency, StorageEngine, StorageError, StorageResult,
    TransactOp, MAX_TRANSACT_ITEMS,
};

use super::conversions::{from_sdk_item, key_to_sdk, sdk_names, sdk_values, to_sdk_item};
use super::error::{
    map_batch_get_error, map_delete_item_error, map_get_item_error, map_put_item_error,
    map_query_error, map_transact_write_error, map_update_item_error,
};
use crate::config::Config;
use crate::schema::{AttributeType, TableDefinition};

/// Keys per BatchGetItem request.
const BATCH_GET_MAX_KEYS: usize = 100;

/// BatchGetItem rounds spent on unprocessed keys before giving up.
const MAX_UNPROCESSED_ROUNDS: u32 = 5;

fn build_error(err: BuildError) -> StorageError {
    StorageError::InvalidRequest(err.to_string())
}

/// DynamoDB-backed storage engine.
#[derive(Debug, Clone)]
pub struct DynamoDbEngine {
    client: Client,
    table_name: String,
    page_size: Option<usize>,
    max_transact_items: usize,
}

impl DynamoDbEngine {
    /// Creates a new engine with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            page_size: None,
            max_transact_items: MAX_TRANSACT_ITEMS,
        }
    }

    /// Creates a new engine from configuration.
    ///
    /// Uses the AWS SDK default credential chain. `AWS_ENDPOINT_URL` points the
    /// client at a local DynamoDB.
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.aws_region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let mut engine = Self::new(Client::new(&sdk_config), &config.table_name);
        engine.page_size = config.query_page_size;
        engine.max_transact_items = config.transact_max_items;
        engine
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Creates the table described by `definition` unless it already exists,
    /// then waits for it to become active.
    pub async fn ensure_table(&self, definition: &TableDefinition) -> StorageResult<()> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => {
                tracing::debug!(table = %self.table_name, "table already exists");
                return Ok(());
            }
            Err(err) => match err.into_service_error() {
                DescribeTableError::ResourceNotFoundException(_) => {}
                err => return Err(StorageError::Backend(format!("DescribeTable failed: {:?}", err))),
            },
        }

        tracing::info!(table = %self.table_name, indexes = definition.indexes.len(), "creating table");
        self.create_table(definition).await?;
        self.wait_for_table_active().await
    }

    async fn create_table(&self, definition: &TableDefinition) -> StorageResult<()> {
        let attribute_definitions = definition
            .key_attributes()
            .into_iter()
            .map(|attribute| {
                AttributeDefinition::builder()
                    .attribute_name(attribute.name)
                    .attribute_type(match attribute.attribute_type {
                        AttributeType::String => ScalarAttributeType::S,
                        AttributeType::Number => ScalarAttributeType::N,
                    })
                    .build()
                    .map_err(build_error)
            })
            .collect::<StorageResult<Vec<_>>>()?;

        let mut request = self
            .client
            .create_table()
            .table_name(&self.table_name)
            .set_attribute_definitions(Some(attribute_definitions))
            .set_key_schema(Some(key_schema(definition.partition_key.name, definition.sort_key.name)?))
            .billing_mode(BillingMode::PayPerRequest);

        for index in &definition.indexes {
            request = request.global_secondary_indexes(
                GlobalSecondaryIndex::builder()
                    .index_name(index.name)
                    .set_key_schema(Some(key_schema(index.partition_key.name, index.sort_key.name)?))
                    .projection(
                        Projection::builder()
                            .projection_type(ProjectionType::All)
                            .build(),
                    )
                    .build()
                    .map_err(build_error)?,
            );
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("CreateTable failed: {e}")))?;
        Ok(())
    }

    async fn wait_for_table_active(&self) -> StorageResult<()> {
        for _ in 0..60 {
            let response = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("DescribeTable failed: {e}")))?;
            if let Some(table) = response.table() {
                let indexes_active = table
                    .global_secondary_indexes()
                    .iter()
                    .all(|index| index.index_status() == Some(&aws_sdk_dynamodb::types::IndexStatus::Active));
                if table.table_status() == Some(&TableStatus::Active) && indexes_active {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Err(StorageError::Backend(format!(
            "table {} did not become active",
            self.table_name
        )))
    }

    fn transact_item(&self, op: &TransactOp) -> StorageResult<TransactWriteItem> {
        let mut attrs = ExpressionAttributes::new();
        let builder = TransactWriteItem::builder();

        let builder = match op {
            TransactOp::Put { item, condition } => {
                let condition = condition.as_ref().map(|c| compile_condition(c, &mut attrs));
                builder.put(
                    Put::builder()
                        .table_name(&self.table_name)
                        .set_item(Some(to_sdk_item(item)))
                        .set_condition_expression(condition)
                        .set_expression_attribute_names(sdk_names(&attrs))
                        .set_expression_attribute_values(sdk_values(&attrs))
                        .build()
                        .map_err(build_error)?,
                )
            }
            TransactOp::Update {
                key,
                update,
                condition,
            } => {
                update.validate()?;
                let expression = compile_update(update, &mut attrs);
                let condition = condition.as_ref().map(|c| compile_condition(c, &mut attrs));
                builder.update(
                    SdkUpdate::builder()
                        .table_name(&self.table_name)
                        .set_key(Some(key_to_sdk(key)))
                        .update_expression(expression)
                        .set_condition_expression(condition)
                        .set_expression_attribute_names(sdk_names(&attrs))
                        .set_expression_attribute_values(sdk_values(&attrs))
                        .build()
                        .map_err(build_error)?,
                )
            }
            TransactOp::Delete { key, condition } => {
                let condition = condition.as_ref().map(|c| compile_condition(c, &mut attrs));
                builder.delete(
                    Delete::builder()
                        .table_name(&self.table_name)
                        .set_key(Some(key_to_sdk(key)))
                        .set_condition_expression(condition)
                        .set_expression_attribute_names(sdk_names(&attrs))
                        .set_expression_attribute_values(sdk_values(&attrs))
                        .build()
                        .map_err(build_error)?,
                )
            }
            TransactOp::ConditionCheck { key, condition } => {
                let condition = compile_condition(condition, &mut attrs);
                builder.condition_check(
                    ConditionCheck::builder()
                        .table_name(&self.table_name)
                        .set_key(Some(key_to_sdk(key)))
                        .condition_expression(condition)
                        .set_expression_attribute_names(sdk_names(&attrs))
                        .set_expression_attribute_values(sdk_values(&attrs))
                        .build()
                        .map_err(build_error)?,
                )
            }
        };

        Ok(builder.build())
    }
}

fn key_schema(partition_key: &str, sort_key: &str) -> StorageResult<Vec<KeySchemaElement>> {
    Ok(vec![
        KeySchemaElement::builder()
            .attribute_name(partition_key)
            .key_type(KeyType::Hash)
            .build()
            .map_err(build_error)?,
        KeySchemaElement::builder()
            .attribute_name(sort_key)
            .key_type(KeyType::Range)
            .build()
            .map_err(build_error)?,
    ])
}

#[async_trait]
impl StorageEngine for DynamoDbEngine {
    async fn get(&self, key: &Key, consistency: ReadConsistency) -> StorageResult<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .consistent_read(consistency == ReadConsistency::Strong)
            .send()
            .await
            .map_err(map_get_item_error)?;

        result.item.as_ref().map(from_sdk_item).transpose()
    }

    async fn put(&self, item: &Item, condition: Option<&Condition>) -> StorageResult<()> {
        let key = Key::from_item(item)
            .ok_or_else(|| StorageError::InvalidRequest("item has no string primary key".to_string()))?;
        let mut attrs = ExpressionAttributes::new();
        let condition = condition.map(|c| compile_condition(c, &mut attrs));

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_sdk_item(item)))
            .set_condition_expression(condition)
            .set_expression_attribute_names(sdk_names(&attrs))
            .set_expression_attribute_values(sdk_values(&attrs))
            .send()
            .await
            .map_err(|e| map_put_item_error(e, &key))?;

        Ok(())
    }

    async fn update(
        &self,
        key: &Key,
        update: &Update,
        condition: Option<&Condition>,
    ) -> StorageResult<Item> {
        update.validate()?;
        let mut attrs = ExpressionAttributes::new();
        let expression = compile_update(update, &mut attrs);
        let condition = condition.map(|c| compile_condition(c, &mut attrs));

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .update_expression(expression)
            .set_condition_expression(condition)
            .set_expression_attribute_names(sdk_names(&attrs))
            .set_expression_attribute_values(sdk_values(&attrs))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| map_update_item_error(e, key))?;

        match result.attributes {
            Some(attributes) => from_sdk_item(&attributes),
            None => Ok(key.to_item()),
        }
    }

    async fn delete(&self, key: &Key, condition: Option<&Condition>) -> StorageResult<Option<Item>> {
        let mut attrs = ExpressionAttributes::new();
        let condition = condition.map(|c| compile_condition(c, &mut attrs));

        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .set_condition_expression(condition)
            .set_expression_attribute_names(sdk_names(&attrs))
            .set_expression_attribute_values(sdk_values(&attrs))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, key))?;

        result.attributes.as_ref().map(from_sdk_item).transpose()
    }

    async fn transact_write(&self, ops: &[TransactOp]) -> StorageResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        if ops.len() > self.max_transact_items {
            return Err(StorageError::TransactionTooLarge {
                size: ops.len(),
                max: self.max_transact_items,
            });
        }
        let mut seen = BTreeSet::new();
        for op in ops {
            let key = op.key()?;
            if !seen.insert(key.clone()) {
                return Err(StorageError::DuplicateTransactionKey { key });
            }
        }

        let items = ops
            .iter()
            .map(|op| self.transact_item(op))
            .collect::<StorageResult<Vec<_>>>()?;

        tracing::debug!(table = %self.table_name, operations = items.len(), "transact write");
        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(map_transact_write_error)?;

        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> StorageResult<Page> {
        if request.index.is_some() && request.consistency == ReadConsistency::Strong {
            return Err(StorageError::InvalidRequest(
                "strongly consistent reads are not supported on indexes".to_string(),
            ));
        }

        let (pk_attr, sk_attr) = match request.index {
            Some(slot) => (slot.partition_key_attr(), slot.sort_key_attr()),
            None => (PARTITION_KEY, SORT_KEY),
        };
        let mut attrs = ExpressionAttributes::new();
        let key_condition = compile_key_condition(&request.key_condition, pk_attr, sk_attr, &mut attrs);
        let filter = request.filter.as_ref().map(|f| compile_condition(f, &mut attrs));
        let projection = request
            .projection
            .as_deref()
            .map(|p| compile_projection(p, &mut attrs));
        let limit = match (request.limit, self.page_size) {
            (Some(limit), Some(size)) => Some(limit.min(size)),
            (limit, size) => limit.or(size),
        };

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(request.index.map(|slot| slot.index_name().to_string()))
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .set_projection_expression(projection)
            .set_expression_attribute_names(sdk_names(&attrs))
            .set_expression_attribute_values(sdk_values(&attrs))
            .scan_index_forward(request.scan_forward)
            .set_limit(limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX)))
            .consistent_read(request.consistency == ReadConsistency::Strong)
            .set_exclusive_start_key(request.start_token.as_ref().map(|token| to_sdk_item(&token.0)))
            .send()
            .await
            .map_err(map_query_error)?;

        let items = result
            .items
            .unwrap_or_default()
            .iter()
            .map(from_sdk_item)
            .collect::<StorageResult<Vec<_>>>()?;
        let next_token = result
            .last_evaluated_key
            .as_ref()
            .map(from_sdk_item)
            .transpose()?
            .map(PageToken);

        Ok(Page { items, next_token })
    }

    async fn batch_get(&self, keys: &[Key], projection: Option<&[String]>) -> StorageResult<Vec<Item>> {
        let unique: Vec<&Key> = keys.iter().collect::<BTreeSet<_>>().into_iter().collect();
        let mut items = Vec::with_capacity(unique.len());

        for chunk in unique.chunks(BATCH_GET_MAX_KEYS) {
            let mut attrs = ExpressionAttributes::new();
            let projection = projection.map(|p| compile_projection(p, &mut attrs));
            let mut pending = Some(
                KeysAndAttributes::builder()
                    .set_keys(Some(chunk.iter().map(|key| key_to_sdk(key)).collect()))
                    .set_projection_expression(projection)
                    .set_expression_attribute_names(sdk_names(&attrs))
                    .build()
                    .map_err(build_error)?,
            );

            let mut rounds = 0;
            while let Some(request) = pending.take() {
                if rounds == MAX_UNPROCESSED_ROUNDS {
                    return Err(StorageError::Transient(
                        "BatchGetItem left keys unprocessed".to_string(),
                    ));
                }
                rounds += 1;

                let result = self
                    .client
                    .batch_get_item()
                    .request_items(&self.table_name, request)
                    .send()
                    .await
                    .map_err(map_batch_get_error)?;

                if let Some(found) = result
                    .responses
                    .as_ref()
                    .and_then(|responses| responses.get(&self.table_name))
                {
                    for item in found {
                        items.push(from_sdk_item(item)?);
                    }
                }

                pending = result
                    .unprocessed_keys
                    .and_then(|mut unprocessed| unprocessed.remove(&self.table_name))
                    .filter(|remaining| !remaining.keys().is_empty());
                if pending.is_some() {
                    tracing::debug!(table = %self.table_name, round = rounds, "retrying unprocessed keys");
                    tokio::time::sleep(Duration::from_millis(25 * u64::from(rounds))).await;
                }
            }
        }

        Ok(items)
    }

    fn max_transact_items(&self) -> usize {
        self.max_transact_items
    }
}
