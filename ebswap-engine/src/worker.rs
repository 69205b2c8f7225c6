use crate::audit::AuditRecorder;
use crate::waiter::{Poll, wait_until};
use chrono::Utc;
use ebswap_core::{
    ComputeApi, CreateVolumeRequest, FailureKind, Result, SnapshotHandle, SnapshotState,
    SwapAuditAfter, SwapAuditBefore, SwapError, SwapState, TagSet, VolumeConfig, VolumeRef,
    VolumeState, WaitBudget, WaitConfig, merge_tags, tag_set, writable_tags,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A swap that reached the terminal `Audited` state.
#[derive(Debug, Clone, Serialize)]
pub struct SwapReport {
    pub old_volume_id: String,
    pub new_volume_id: String,
    pub snapshot_id: String,
    pub device_name: String,
    pub size: i32,
    /// Audit writes that failed; the physical swap still completed.
    pub audit_failures: Vec<String>,
}

impl SwapReport {
    pub fn is_degraded(&self) -> bool {
        !self.audit_failures.is_empty()
    }
}

/// A swap that ended in `Failed`. `state` is the last state reached before the
/// failing transition.
#[derive(Debug, Clone, Serialize)]
pub struct SwapFailure {
    pub volume_id: String,
    pub device_name: String,
    pub state: SwapState,
    pub kind: FailureKind,
    pub message: String,
}

pub type SwapOutcome = std::result::Result<SwapReport, SwapFailure>;

/// Source configuration and instance metadata captured at `Start`.
struct Captured {
    config: VolumeConfig,
    base_tags: TagSet,
    instance_name: String,
    security_group_names: String,
}

/// Replaces one attached volume with a copy restored from a fresh snapshot.
pub struct VolumeSwapWorker {
    compute: Arc<dyn ComputeApi>,
    recorder: Arc<AuditRecorder>,
    waits: WaitConfig,
    instance_id: String,
    volume: VolumeRef,
    state: SwapState,
    audit_failures: Vec<String>,
}

impl VolumeSwapWorker {
    pub fn new(
        compute: Arc<dyn ComputeApi>,
        recorder: Arc<AuditRecorder>,
        waits: WaitConfig,
        instance_id: impl Into<String>,
        volume: VolumeRef,
    ) -> Self {
        Self {
            compute,
            recorder,
            waits,
            instance_id: instance_id.into(),
            volume,
            state: SwapState::Start,
            audit_failures: Vec::new(),
        }
    }

    pub fn state(&self) -> SwapState {
        self.state
    }

    pub async fn run(mut self) -> SwapOutcome {
        info!(
            "Processing volume {} ({})",
            self.volume.volume_id, self.volume.device_name
        );

        match self.execute().await {
            Ok(report) => Ok(report),
            Err(e) => {
                let failed_in = self.state;
                self.state = SwapState::Failed;
                let kind = e.kind();
                error!(
                    "Swap of volume {} failed after {} ({}): {}",
                    self.volume.volume_id, failed_in, kind, e
                );
                Err(SwapFailure {
                    volume_id: self.volume.volume_id.clone(),
                    device_name: self.volume.device_name.clone(),
                    state: failed_in,
                    kind,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn execute(&mut self) -> Result<SwapReport> {
        let captured = self.capture().await?;
        let snapshot = self.take_snapshot(&captured).await?;
        let new_volume_id = self.provision(&captured, &snapshot).await?;
        self.detach_old(&captured, &snapshot, &new_volume_id).await?;
        self.attach_new(&new_volume_id).await?;
        self.advance(SwapState::Audited);

        info!(
            "Volume {} swapped with {} using snapshot {}. Size: {} GiB",
            self.volume.volume_id, new_volume_id, snapshot.snapshot_id, captured.config.size
        );

        Ok(SwapReport {
            old_volume_id: self.volume.volume_id.clone(),
            new_volume_id,
            snapshot_id: snapshot.snapshot_id,
            device_name: self.volume.device_name.clone(),
            size: captured.config.size,
            audit_failures: std::mem::take(&mut self.audit_failures),
        })
    }

    async fn capture(&self) -> Result<Captured> {
        let source = self.compute.describe_volume(&self.volume.volume_id).await?;
        let instance = self.compute.describe_instance(&self.instance_id).await?;

        let config = VolumeConfig::from(source);
        Ok(Captured {
            base_tags: writable_tags(&config.tags),
            instance_name: instance.name().to_string(),
            security_group_names: instance.security_group_names.join(","),
            config,
        })
    }

    /// `Start -> SnapshotRequested -> SnapshotReady`
    async fn take_snapshot(&mut self, captured: &Captured) -> Result<SnapshotHandle> {
        let volume_id = self.volume.volume_id.clone();
        let config = &captured.config;

        let snapshot_id = self
            .compute
            .create_snapshot(&volume_id, &format!("Snapshot of {volume_id} before swap"))
            .await?;
        self.advance(SwapState::SnapshotRequested);
        info!("Snapshot {} initiated", snapshot_id);
        info!("KMS key used: {}", config.key_id.as_deref().unwrap_or("None"));

        wait_for_snapshot(
            self.compute.as_ref(),
            &snapshot_id,
            self.waits.snapshot_completed,
        )
        .await?;
        info!("Snapshot {} completed", snapshot_id);

        let overrides = tag_set([
            ("Name", format!("Snapshot-of-{volume_id}")),
            ("device_name", self.volume.device_name.clone()),
            ("VolumeType", config.volume_type.clone()),
            ("Size", config.size.to_string()),
            ("IOPS", config.iops.to_string()),
            ("Throughput", config.throughput.to_string()),
            ("AvailabilityZone", config.availability_zone.clone()),
            ("SecurityGroupName", captured.security_group_names.clone()),
            (
                "kms_key_id",
                config.key_id.clone().unwrap_or_else(|| "None".to_string()),
            ),
        ]);
        self.compute
            .create_tags(&snapshot_id, &merge_tags(&captured.base_tags, overrides))
            .await?;

        let row = SwapAuditBefore {
            old_volume_id: volume_id.clone(),
            name: format!("OLD-{volume_id}"),
            instance_name: captured.instance_name.clone(),
            instance_id: self.instance_id.clone(),
            device_name: self.volume.device_name.clone(),
            size: config.size,
            iops: config.iops,
            throughput: config.throughput,
            snapshot_id: snapshot_id.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.recorder.record_before(&row).await {
            self.audit_degraded("before", e);
        }

        self.advance(SwapState::SnapshotReady);
        Ok(SnapshotHandle {
            snapshot_id,
            source_volume_id: volume_id,
        })
    }

    /// `SnapshotReady -> VolumeProvisioned`
    async fn provision(&mut self, captured: &Captured, snapshot: &SnapshotHandle) -> Result<String> {
        let config = &captured.config;
        let overrides = tag_set([
            ("Name", format!("Recreated-{}", snapshot.source_volume_id)),
            ("SourceSnapshot", snapshot.snapshot_id.clone()),
        ]);

        let request = CreateVolumeRequest {
            snapshot_id: snapshot.snapshot_id.clone(),
            availability_zone: config.availability_zone.clone(),
            volume_type: config.volume_type.clone(),
            encrypted: config.encrypted,
            key_id: config.key_id.clone(),
            size: config.size,
            iops: config.iops,
            throughput: config.throughput,
            tags: merge_tags(&captured.base_tags, overrides),
        };

        let new_volume_id = self.compute.create_volume(&request).await?;
        info!("New volume {} creation started", new_volume_id);

        wait_for_available(
            self.compute.as_ref(),
            &new_volume_id,
            self.waits.volume_available,
        )
        .await?;
        info!("New volume {} is now available", new_volume_id);

        self.advance(SwapState::VolumeProvisioned);
        Ok(new_volume_id)
    }

    /// `VolumeProvisioned -> OldDetached`
    async fn detach_old(
        &mut self,
        captured: &Captured,
        snapshot: &SnapshotHandle,
        new_volume_id: &str,
    ) -> Result<()> {
        let config = &captured.config;
        let row = SwapAuditAfter {
            new_volume_id: new_volume_id.to_string(),
            source_snapshot: snapshot.snapshot_id.clone(),
            instance_id: self.instance_id.clone(),
            instance_name: captured.instance_name.clone(),
            device_name: self.volume.device_name.clone(),
            size: config.size,
            iops: config.iops,
            throughput: config.throughput,
            volume_type: config.volume_type.clone(),
            availability_zone: config.availability_zone.clone(),
            security_group_names: captured.security_group_names.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.recorder.record_after(&row).await {
            self.audit_degraded("after", e);
        }

        info!("Detaching old volume {}", self.volume.volume_id);
        self.compute
            .detach_volume(&self.volume.volume_id, &self.instance_id, true)
            .await?;
        wait_for_available(
            self.compute.as_ref(),
            &self.volume.volume_id,
            self.waits.volume_available,
        )
        .await?;
        info!("Old volume {} detached", self.volume.volume_id);

        self.advance(SwapState::OldDetached);
        Ok(())
    }

    /// `OldDetached -> NewAttached`. The replacement takes the exact device
    /// name recorded at `Start`.
    async fn attach_new(&mut self, new_volume_id: &str) -> Result<()> {
        info!(
            "Attaching new volume {} to device {}",
            new_volume_id, self.volume.device_name
        );
        self.compute
            .attach_volume(new_volume_id, &self.instance_id, &self.volume.device_name)
            .await?;

        let retired = tag_set([("Name", format!("OLD-{}", self.volume.volume_id))]);
        self.compute
            .create_tags(&self.volume.volume_id, &retired)
            .await?;

        self.advance(SwapState::NewAttached);
        Ok(())
    }

    fn advance(&mut self, next: SwapState) {
        debug!("{}: {} -> {}", self.volume.volume_id, self.state, next);
        self.state = next;
    }

    fn audit_degraded(&mut self, row: &str, e: SwapError) {
        warn!(
            "Continuing swap of {} without the {} audit row",
            self.volume.volume_id, row
        );
        self.audit_failures.push(format!("{row}: {e}"));
    }
}

async fn wait_for_snapshot(
    compute: &dyn ComputeApi,
    snapshot_id: &str,
    budget: WaitBudget,
) -> Result<()> {
    wait_until(snapshot_id, "completed", budget, move || async move {
        Ok(match compute.snapshot_state(snapshot_id).await? {
            SnapshotState::Completed => Poll::Ready,
            SnapshotState::Error => Poll::Failed(SnapshotState::Error.to_string()),
            other => Poll::Pending(other.to_string()),
        })
    })
    .await
}

async fn wait_for_available(
    compute: &dyn ComputeApi,
    volume_id: &str,
    budget: WaitBudget,
) -> Result<()> {
    wait_until(volume_id, "available", budget, move || async move {
        Ok(match compute.volume_state(volume_id).await? {
            VolumeState::Available => Poll::Ready,
            state @ (VolumeState::Deleting | VolumeState::Deleted | VolumeState::Error) => {
                Poll::Failed(state.to_string())
            }
            other => Poll::Pending(other.to_string()),
        })
    })
    .await
}
