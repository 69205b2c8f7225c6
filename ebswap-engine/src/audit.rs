use ebswap_core::{
    AuditConfig, AuditStore, Result, SwapAuditAfter, SwapAuditBefore, SwapError, TableState,
    TableStatus,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const BEFORE_TABLE_KEY: &str = "old_volume_id";
pub const AFTER_TABLE_KEY: &str = "new_volume";

/// Writes the before/after swap rows to their audit tables.
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    before_table: String,
    after_table: String,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>, config: &AuditConfig) -> Self {
        Self {
            store,
            before_table: config.before_table.clone(),
            after_table: config.after_table.clone(),
        }
    }

    /// Creates both audit tables if absent. Must run once before any swap.
    ///
    /// Existing tables are never re-created, so pre-provisioned tables work
    /// without permission to create tables.
    pub async fn ensure_tables(&self) -> Result<()> {
        for (table, key) in [
            (&self.before_table, BEFORE_TABLE_KEY),
            (&self.after_table, AFTER_TABLE_KEY),
        ] {
            match self.ensure_table(table, key).await {
                Ok(TableStatus::Created) => info!("Table '{}' created", table),
                Ok(TableStatus::AlreadyExists) => info!("Table '{}' already exists", table),
                Err(e) => {
                    error!("Failed to prepare table {}: {}", table, e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn ensure_table(&self, table: &str, key: &str) -> Result<TableStatus> {
        let status = match self.store.table_state(table).await? {
            Some(TableState::Active) => return Ok(TableStatus::AlreadyExists),
            Some(state) => {
                debug!("Table '{}' is {}, waiting until it is active", table, state);
                TableStatus::AlreadyExists
            }
            None => self.store.create_table(table, key).await?,
        };
        self.store.wait_until_active(table).await?;
        Ok(status)
    }

    pub async fn record_before(&self, row: &SwapAuditBefore) -> Result<()> {
        let result = self.put(&self.before_table, row).await;
        match &result {
            Ok(()) => info!("Logged OLD volume {} into {}", row.old_volume_id, self.before_table),
            Err(e) => error!("Failed to log old volume {}: {}", row.old_volume_id, e),
        }
        result
    }

    pub async fn record_after(&self, row: &SwapAuditAfter) -> Result<()> {
        let result = self.put(&self.after_table, row).await;
        match &result {
            Ok(()) => info!("Logged NEW volume {} into {}", row.new_volume_id, self.after_table),
            Err(e) => error!("Failed to log new volume {}: {}", row.new_volume_id, e),
        }
        result
    }

    async fn put<T: Serialize>(&self, table: &str, row: &T) -> Result<()> {
        let item = match serde_json::to_value(row)? {
            Value::Object(item) => item,
            other => {
                return Err(SwapError::Unexpected(format!(
                    "audit row for {table} serialized to {other}"
                )));
            }
        };
        self.store.put_item(table, item).await
    }
}
