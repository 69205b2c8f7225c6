#![allow(dead_code)]

use async_trait::async_trait;
use ebswap_core::{
    AuditStore, BlockDeviceAttachment, ComputeApi, CreateVolumeRequest, InstanceDescription,
    Result, SnapshotState, SwapConfig, SwapError, TableState, TableStatus, TagSet, VolumeDescription,
    VolumeState, WaitBudget, WaitConfig, tag_set,
};
use ebswap_engine::{AuditRecorder, SwapCoordinator};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const INSTANCE_ID: &str = "i-0abc";

#[derive(Default)]
pub struct FakeState {
    pub instances: HashMap<String, InstanceDescription>,
    pub volumes: HashMap<String, VolumeDescription>,
    pub volume_states: HashMap<String, VolumeState>,
    /// snapshot id -> (source volume id, polls seen)
    pub snapshots: HashMap<String, (String, u32)>,
    pub volume_polls: HashMap<String, u32>,
    pub tags: HashMap<String, TagSet>,
    pub created_volumes: Vec<CreateVolumeRequest>,
    /// Volumes whose snapshots never leave `pending`.
    pub stuck_snapshots: HashSet<String>,
    /// Source volumes whose restored replacement never leaves `creating`.
    pub stuck_restores: HashSet<String>,
    /// Volumes that never settle: stay `creating`, or `in-use` after a detach.
    pub stuck_volumes: HashSet<String>,
    /// Volumes detached but still reporting `in-use` until they settle.
    pub detaching: HashSet<String>,
    /// operation name -> rejection message
    pub rejections: HashMap<String, String>,
    pub calls: Vec<String>,
    next_id: u32,
}

/// In-memory control API. Resources settle after `settle_polls` pending polls.
pub struct FakeCompute {
    pub state: Mutex<FakeState>,
    settle_polls: u32,
}

impl FakeCompute {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            settle_polls: 1,
        }
    }

    /// Adds an instance named `name` with `devices` as (device, volume id)
    /// attachments; every volume is a 100 GiB gp3 disk.
    pub fn with_instance(self, name: &str, devices: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let attachments = devices
                .iter()
                .map(|(device, volume_id)| BlockDeviceAttachment {
                    device_name: device.to_string(),
                    volume_id: Some(volume_id.to_string()),
                })
                .collect();
            state.instances.insert(
                INSTANCE_ID.to_string(),
                InstanceDescription {
                    instance_id: INSTANCE_ID.to_string(),
                    attachments,
                    security_group_names: vec!["web".to_string(), "ssh".to_string()],
                    tags: tag_set([("Name", name)]),
                },
            );
            for (_, volume_id) in devices {
                state.volumes.insert(
                    volume_id.to_string(),
                    VolumeDescription {
                        volume_id: volume_id.to_string(),
                        size: 100,
                        iops: Some(3000),
                        throughput: Some(125),
                        volume_type: "gp3".to_string(),
                        availability_zone: "us-east-1a".to_string(),
                        encrypted: true,
                        kms_key_id: Some("key-1".to_string()),
                        tags: tag_set([("Name", format!("data-{volume_id}")), ("Team", "storage".to_string())]),
                    },
                );
                state
                    .volume_states
                    .insert(volume_id.to_string(), VolumeState::InUse);
            }
        }
        self
    }

    pub fn edit(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn snapshot(&self) -> FakeStateView {
        let state = self.state.lock().unwrap();
        FakeStateView {
            attachments: state
                .instances
                .get(INSTANCE_ID)
                .map(|i| i.attachments.clone())
                .unwrap_or_default(),
            tags: state.tags.clone(),
            created_volumes: state.created_volumes.clone(),
            calls: state.calls.clone(),
        }
    }

    fn check(&self, state: &mut FakeState, operation: &str, resource: &str) -> Result<()> {
        state.calls.push(format!("{operation}:{resource}"));
        match state.rejections.get(operation) {
            Some(message) => Err(SwapError::rejected(operation, resource, message.clone())),
            None => Ok(()),
        }
    }
}

pub struct FakeStateView {
    pub attachments: Vec<BlockDeviceAttachment>,
    pub tags: HashMap<String, TagSet>,
    pub created_volumes: Vec<CreateVolumeRequest>,
    pub calls: Vec<String>,
}

impl FakeStateView {
    pub fn device_of(&self, volume_id: &str) -> Option<&str> {
        self.attachments
            .iter()
            .find(|a| a.volume_id.as_deref() == Some(volume_id))
            .map(|a| a.device_name.as_str())
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceDescription> {
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, "DescribeInstances", instance_id)?;
        state.instances.get(instance_id).cloned().ok_or_else(|| {
            SwapError::rejected("DescribeInstances", instance_id, "InvalidInstanceID.NotFound")
        })
    }

    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeDescription> {
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, "DescribeVolumes", volume_id)?;
        state.volumes.get(volume_id).cloned().ok_or_else(|| {
            SwapError::rejected("DescribeVolumes", volume_id, "InvalidVolume.NotFound")
        })
    }

    async fn create_snapshot(&self, volume_id: &str, _description: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, "CreateSnapshot", volume_id)?;
        state.next_id += 1;
        let snapshot_id = format!("snap-{}", state.next_id);
        state
            .snapshots
            .insert(snapshot_id.clone(), (volume_id.to_string(), 0));
        Ok(snapshot_id)
    }

    async fn snapshot_state(&self, snapshot_id: &str) -> Result<SnapshotState> {
        let mut state = self.state.lock().unwrap();
        let stuck = state.stuck_snapshots.clone();
        let (source, polls) = state.snapshots.get_mut(snapshot_id).ok_or_else(|| {
            SwapError::rejected("DescribeSnapshots", snapshot_id, "InvalidSnapshot.NotFound")
        })?;
        if stuck.contains(source.as_str()) || *polls < self.settle_polls {
            *polls += 1;
            return Ok(SnapshotState::Pending);
        }
        Ok(SnapshotState::Completed)
    }

    async fn create_tags(&self, resource_id: &str, tags: &TagSet) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, "CreateTags", resource_id)?;
        state
            .tags
            .entry(resource_id.to_string())
            .or_default()
            .extend(tags.clone());
        Ok(())
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, "CreateVolume", &request.snapshot_id)?;
        state.next_id += 1;
        let volume_id = format!("vol-new-{}", state.next_id);
        let restores_stuck_source = state
            .snapshots
            .get(&request.snapshot_id)
            .is_some_and(|(source, _)| state.stuck_restores.contains(source));
        if restores_stuck_source {
            state.stuck_volumes.insert(volume_id.clone());
        }
        state.created_volumes.push(request.clone());
        state
            .tags
            .insert(volume_id.clone(), request.tags.clone());
        state.volumes.insert(
            volume_id.clone(),
            VolumeDescription {
                volume_id: volume_id.clone(),
                size: request.size,
                iops: Some(request.iops),
                throughput: Some(request.throughput),
                volume_type: request.volume_type.clone(),
                availability_zone: request.availability_zone.clone(),
                encrypted: request.encrypted,
                kms_key_id: request.key_id.clone(),
                tags: request.tags.clone(),
            },
        );
        state
            .volume_states
            .insert(volume_id.clone(), VolumeState::Creating);
        Ok(volume_id)
    }

    async fn volume_state(&self, volume_id: &str) -> Result<VolumeState> {
        let mut state = self.state.lock().unwrap();
        let polls = {
            let polls = state.volume_polls.entry(volume_id.to_string()).or_insert(0);
            *polls += 1;
            *polls
        };
        let stuck = state.stuck_volumes.contains(volume_id);
        let detaching = state.detaching.contains(volume_id);
        let volume_state = state.volume_states.get_mut(volume_id).ok_or_else(|| {
            SwapError::rejected("DescribeVolumes", volume_id, "InvalidVolume.NotFound")
        })?;
        let settling = *volume_state == VolumeState::Creating
            || (*volume_state == VolumeState::InUse && detaching);
        if settling && !stuck && polls > self.settle_polls {
            *volume_state = VolumeState::Available;
        }
        Ok(volume_state.clone())
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str, force: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, "DetachVolume", volume_id)?;
        assert!(force, "swaps always force-detach");
        let instance = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| SwapError::rejected("DetachVolume", instance_id, "not found"))?;
        let before = instance.attachments.len();
        instance
            .attachments
            .retain(|a| a.volume_id.as_deref() != Some(volume_id));
        if instance.attachments.len() == before {
            return Err(SwapError::rejected(
                "DetachVolume",
                volume_id,
                "IncorrectState: volume is not attached",
            ));
        }
        // Stays in-use until polled past `settle_polls`.
        state.detaching.insert(volume_id.to_string());
        state.volume_polls.insert(volume_id.to_string(), 0);
        Ok(())
    }

    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, "AttachVolume", volume_id)?;
        let available = state
            .volume_states
            .get(volume_id)
            .is_some_and(|s| *s == VolumeState::Available);
        if !available {
            return Err(SwapError::rejected(
                "AttachVolume",
                volume_id,
                "IncorrectState: volume is not available",
            ));
        }
        let instance = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| SwapError::rejected("AttachVolume", instance_id, "not found"))?;
        if instance.attachments.iter().any(|a| a.device_name == device) {
            return Err(SwapError::rejected(
                "AttachVolume",
                volume_id,
                format!("InvalidParameterValue: {device} is already in use"),
            ));
        }
        instance.attachments.push(BlockDeviceAttachment {
            device_name: device.to_string(),
            volume_id: Some(volume_id.to_string()),
        });
        state
            .volume_states
            .insert(volume_id.to_string(), VolumeState::InUse);
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Audit tables held in memory, keyed by table then row key.
#[derive(Default)]
pub struct MemoryAuditStore {
    tables: Mutex<HashMap<String, (String, HashMap<String, Map<String, Value>>)>>,
    /// Tables that report `CREATING` until waited on.
    creating: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    pub fail_writes: AtomicBool,
    /// Rejects table creation as a caller without create permission.
    pub deny_create: AtomicBool,
}

impl MemoryAuditStore {
    /// Adds an existing table, as an operator would before granting write-only access.
    pub fn provision(&self, table: &str, key_attribute: &str, active: bool) {
        self.tables
            .lock()
            .unwrap()
            .insert(table.to_string(), (key_attribute.to_string(), HashMap::new()));
        if !active {
            self.creating.lock().unwrap().insert(table.to_string());
        }
    }

    pub fn rows(&self, table: &str) -> HashMap<String, Map<String, Value>> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, table: &str) {
        self.calls.lock().unwrap().push(format!("{operation}:{table}"));
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn table_state(&self, table: &str) -> Result<Option<TableState>> {
        self.record("DescribeTable", table);
        if !self.tables.lock().unwrap().contains_key(table) {
            return Ok(None);
        }
        if self.creating.lock().unwrap().contains(table) {
            return Ok(Some(TableState::Creating));
        }
        Ok(Some(TableState::Active))
    }

    async fn create_table(&self, table: &str, key_attribute: &str) -> Result<TableStatus> {
        self.record("CreateTable", table);
        if self.deny_create.load(Ordering::SeqCst) {
            return Err(SwapError::rejected(
                "CreateTable",
                table,
                "AccessDeniedException: not authorized to perform dynamodb:CreateTable",
            ));
        }
        let mut tables = self.tables.lock().unwrap();
        if tables.contains_key(table) {
            return Ok(TableStatus::AlreadyExists);
        }
        tables.insert(table.to_string(), (key_attribute.to_string(), HashMap::new()));
        self.creating.lock().unwrap().insert(table.to_string());
        Ok(TableStatus::Created)
    }

    async fn wait_until_active(&self, table: &str) -> Result<()> {
        self.record("WaitTable", table);
        self.creating.lock().unwrap().remove(table);
        Ok(())
    }

    async fn put_item(&self, table: &str, item: Map<String, Value>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SwapError::rejected(
                "PutItem",
                table,
                "ProvisionedThroughputExceededException",
            ));
        }
        if self.creating.lock().unwrap().contains(table) {
            return Err(SwapError::rejected("PutItem", table, "ResourceNotFoundException"));
        }
        let mut tables = self.tables.lock().unwrap();
        let (key_attribute, rows) = tables
            .get_mut(table)
            .ok_or_else(|| SwapError::rejected("PutItem", table, "ResourceNotFoundException"))?;
        let key = item
            .get(key_attribute.as_str())
            .and_then(Value::as_str)
            .ok_or_else(|| SwapError::rejected("PutItem", table, "missing key attribute"))?
            .to_string();
        rows.insert(key, item);
        Ok(())
    }
}

pub fn fast_config() -> SwapConfig {
    let budget = WaitBudget {
        delay_secs: 0,
        max_attempts: 5,
    };
    SwapConfig {
        waits: WaitConfig {
            snapshot_completed: budget,
            volume_available: budget,
        },
        ..SwapConfig::default()
    }
}

pub struct Harness {
    pub compute: Arc<FakeCompute>,
    pub store: Arc<MemoryAuditStore>,
    pub recorder: Arc<AuditRecorder>,
    pub coordinator: SwapCoordinator,
    pub config: SwapConfig,
}

pub async fn harness(compute: FakeCompute) -> Harness {
    let config = fast_config();
    let compute = Arc::new(compute);
    let store = Arc::new(MemoryAuditStore::default());
    let recorder = Arc::new(AuditRecorder::new(store.clone(), &config.audit));
    recorder
        .ensure_tables()
        .await
        .expect("in-memory tables are always creatable");
    let coordinator = SwapCoordinator::new(compute.clone(), recorder.clone(), &config);
    Harness {
        compute,
        store,
        recorder,
        coordinator,
        config,
    }
}
