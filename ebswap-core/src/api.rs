use crate::error::Result;
use crate::types::*;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// The compute/storage control API consumed by a swap.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceDescription>;
    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeDescription>;
    /// Returns the id of the new snapshot.
    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String>;
    async fn snapshot_state(&self, snapshot_id: &str) -> Result<SnapshotState>;
    async fn create_tags(&self, resource_id: &str, tags: &TagSet) -> Result<()>;
    /// Returns the id of the new volume.
    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<String>;
    async fn volume_state(&self, volume_id: &str) -> Result<VolumeState>;
    async fn detach_volume(&self, volume_id: &str, instance_id: &str, force: bool) -> Result<()>;
    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Created,
    AlreadyExists,
}

/// Lifecycle of an existing audit table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState {
    Creating,
    Active,
    Other(String),
}

impl std::fmt::Display for TableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableState::Creating => write!(f, "CREATING"),
            TableState::Active => write!(f, "ACTIVE"),
            TableState::Other(state) => write!(f, "{state}"),
        }
    }
}

/// Key-value store holding the audit tables. Writes only.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// `None` when `table` does not exist.
    async fn table_state(&self, table: &str) -> Result<Option<TableState>>;
    /// Creates `table` keyed by the string attribute `key_attribute`. Losing a
    /// creation race to another writer yields `AlreadyExists`.
    async fn create_table(&self, table: &str, key_attribute: &str) -> Result<TableStatus>;
    /// Returns once `table` accepts writes.
    async fn wait_until_active(&self, table: &str) -> Result<()>;
    /// Upserts `item`; an existing row with the same key is replaced.
    async fn put_item(&self, table: &str, item: Map<String, Value>) -> Result<()>;
}
