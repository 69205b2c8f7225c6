use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tags keyed by tag key. Mapping semantics: one value per key.
pub type TagSet = BTreeMap<String, String>;

/// Instance name recorded when the instance carries no `Name` tag.
pub const UNKNOWN_INSTANCE_NAME: &str = "Unknown";

/// One attachment selected for replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    pub volume_id: String,
    pub device_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDeviceAttachment {
    pub device_name: String,
    /// Absent for non-EBS mappings.
    pub volume_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub attachments: Vec<BlockDeviceAttachment>,
    pub security_group_names: Vec<String>,
    pub tags: TagSet,
}

impl InstanceDescription {
    pub fn name(&self) -> &str {
        self.tags
            .get("Name")
            .map(String::as_str)
            .unwrap_or(UNKNOWN_INSTANCE_NAME)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeDescription {
    pub volume_id: String,
    pub size: i32,
    pub iops: Option<i32>,
    pub throughput: Option<i32>,
    pub volume_type: String,
    pub availability_zone: String,
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    pub tags: TagSet,
}

/// Source volume configuration, captured once when a swap starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub size: i32,
    pub iops: i32,
    pub throughput: i32,
    pub volume_type: String,
    pub availability_zone: String,
    pub encrypted: bool,
    pub key_id: Option<String>,
    pub tags: TagSet,
}

impl From<VolumeDescription> for VolumeConfig {
    /// Unset IOPS and throughput are recorded as 0.
    fn from(volume: VolumeDescription) -> Self {
        Self {
            size: volume.size,
            iops: volume.iops.unwrap_or(0),
            throughput: volume.throughput.unwrap_or(0),
            volume_type: volume.volume_type,
            availability_zone: volume.availability_zone,
            encrypted: volume.encrypted,
            key_id: volume.kms_key_id,
            tags: volume.tags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHandle {
    pub snapshot_id: String,
    pub source_volume_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotState {
    Pending,
    Completed,
    Error,
    Other(String),
}

impl SnapshotState {
    pub fn parse(state: &str) -> Self {
        match state {
            "pending" => SnapshotState::Pending,
            "completed" => SnapshotState::Completed,
            "error" => SnapshotState::Error,
            other => SnapshotState::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotState::Pending => write!(f, "pending"),
            SnapshotState::Completed => write!(f, "completed"),
            SnapshotState::Error => write!(f, "error"),
            SnapshotState::Other(state) => write!(f, "{state}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeState {
    Creating,
    Available,
    InUse,
    Deleting,
    Deleted,
    Error,
    Other(String),
}

impl VolumeState {
    pub fn parse(state: &str) -> Self {
        match state {
            "creating" => VolumeState::Creating,
            "available" => VolumeState::Available,
            "in-use" => VolumeState::InUse,
            "deleting" => VolumeState::Deleting,
            "deleted" => VolumeState::Deleted,
            "error" => VolumeState::Error,
            other => VolumeState::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for VolumeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeState::Creating => write!(f, "creating"),
            VolumeState::Available => write!(f, "available"),
            VolumeState::InUse => write!(f, "in-use"),
            VolumeState::Deleting => write!(f, "deleting"),
            VolumeState::Deleted => write!(f, "deleted"),
            VolumeState::Error => write!(f, "error"),
            VolumeState::Other(state) => write!(f, "{state}"),
        }
    }
}

/// Parameters for provisioning a replacement volume from a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub snapshot_id: String,
    pub availability_zone: String,
    pub volume_type: String,
    pub encrypted: bool,
    pub key_id: Option<String>,
    pub size: i32,
    pub iops: i32,
    pub throughput: i32,
    pub tags: TagSet,
}

/// Pre-swap audit row, keyed by the old volume id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapAuditBefore {
    pub old_volume_id: String,
    pub name: String,
    #[serde(rename = "instancename")]
    pub instance_name: String,
    pub instance_id: String,
    #[serde(rename = "devicename")]
    pub device_name: String,
    pub size: i32,
    pub iops: i32,
    pub throughput: i32,
    #[serde(rename = "snapshotid")]
    pub snapshot_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Post-swap audit row, keyed by the new volume id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapAuditAfter {
    #[serde(rename = "new_volume")]
    pub new_volume_id: String,
    pub source_snapshot: String,
    pub instance_id: String,
    #[serde(rename = "instancename")]
    pub instance_name: String,
    #[serde(rename = "devicename")]
    pub device_name: String,
    pub size: i32,
    pub iops: i32,
    pub throughput: i32,
    pub volume_type: String,
    pub availability_zone: String,
    pub security_group_names: String,
    pub timestamp: DateTime<Utc>,
}

/// Steps of the single-volume swap, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapState {
    Start,
    SnapshotRequested,
    SnapshotReady,
    VolumeProvisioned,
    OldDetached,
    NewAttached,
    Audited,
    Failed,
}

impl std::fmt::Display for SwapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SwapState::Start => "start",
            SwapState::SnapshotRequested => "snapshot-requested",
            SwapState::SnapshotReady => "snapshot-ready",
            SwapState::VolumeProvisioned => "volume-provisioned",
            SwapState::OldDetached => "old-detached",
            SwapState::NewAttached => "new-attached",
            SwapState::Audited => "audited",
            SwapState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}
