use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::client::Waiters;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, TableStatus as DynamoTableStatus,
};
use ebswap_core::{AuditConfig, AuditStore, Result, SwapError, TableState, TableStatus};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// [`AuditStore`] backed by DynamoDB tables with a single string hash key.
pub struct DynamoAuditStore {
    client: Client,
    read_capacity: i64,
    write_capacity: i64,
    ready_timeout: Duration,
}

impl DynamoAuditStore {
    pub fn new(sdk_config: &aws_config::SdkConfig, config: &AuditConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
            read_capacity: config.read_capacity,
            write_capacity: config.write_capacity,
            ready_timeout: Duration::from_secs(config.table_ready_timeout_secs),
        }
    }
}

fn build_error(err: impl std::fmt::Display) -> SwapError {
    SwapError::Unexpected(format!("invalid DynamoDB request: {err}"))
}

pub(crate) fn to_table_state(status: Option<&DynamoTableStatus>) -> TableState {
    match status {
        Some(DynamoTableStatus::Active) => TableState::Active,
        Some(DynamoTableStatus::Creating) => TableState::Creating,
        Some(other) => TableState::Other(other.as_str().to_string()),
        None => TableState::Other("UNKNOWN".to_string()),
    }
}

pub(crate) fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(items) => AttributeValue::L(items.into_iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(to_item(fields)),
    }
}

pub(crate) fn to_item(fields: Map<String, Value>) -> HashMap<String, AttributeValue> {
    fields
        .into_iter()
        .map(|(key, value)| (key, to_attribute(value)))
        .collect()
}

#[async_trait]
impl AuditStore for DynamoAuditStore {
    async fn table_state(&self, table: &str) -> Result<Option<TableState>> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(output) => Ok(Some(to_table_state(
                output.table().and_then(|description| description.table_status()),
            ))),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|service| service.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(SwapError::rejected(
                "DescribeTable",
                table,
                DisplayErrorContext(e).to_string(),
            )),
        }
    }

    async fn create_table(&self, table: &str, key_attribute: &str) -> Result<TableStatus> {
        let key_schema = KeySchemaElement::builder()
            .attribute_name(key_attribute)
            .key_type(KeyType::Hash)
            .build()
            .map_err(build_error)?;
        let definition = AttributeDefinition::builder()
            .attribute_name(key_attribute)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(build_error)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(self.read_capacity)
            .write_capacity_units(self.write_capacity)
            .build()
            .map_err(build_error)?;

        let created = self
            .client
            .create_table()
            .table_name(table)
            .key_schema(key_schema)
            .attribute_definitions(definition)
            .provisioned_throughput(throughput)
            .send()
            .await;

        match created {
            Ok(_) => Ok(TableStatus::Created),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|service| service.is_resource_in_use_exception()) =>
            {
                Ok(TableStatus::AlreadyExists)
            }
            Err(e) => Err(SwapError::rejected(
                "CreateTable",
                table,
                DisplayErrorContext(e).to_string(),
            )),
        }
    }

    async fn wait_until_active(&self, table: &str) -> Result<()> {
        self.client
            .wait_until_table_exists()
            .table_name(table)
            .wait(self.ready_timeout)
            .await
            .map_err(|e| SwapError::TerminalState {
                resource: table.to_string(),
                target: "ACTIVE".to_string(),
                state: DisplayErrorContext(e).to_string(),
            })?;
        Ok(())
    }

    async fn put_item(&self, table: &str, item: Map<String, Value>) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_item(item)))
            .send()
            .await
            .map_err(|e| SwapError::rejected("PutItem", table, DisplayErrorContext(e).to_string()))?;
        Ok(())
    }
}
