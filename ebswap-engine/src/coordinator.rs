use crate::audit::AuditRecorder;
use crate::locator::{VolumeFilter, VolumeLocator};
use crate::worker::{SwapFailure, SwapReport, VolumeSwapWorker};
use ebswap_core::{ComputeApi, FailureKind, SwapConfig, SwapState, VolumeRef, WaitConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// Aggregate result of one run against one instance.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub instance_id: String,
    pub volumes: Vec<VolumeRef>,
    pub swaps: Vec<SwapReport>,
    pub failures: Vec<SwapFailure>,
}

impl RunOutcome {
    /// No eligible volumes were found.
    pub fn is_noop(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Every eligible volume reached `Audited`.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.swaps.len() == self.volumes.len()
    }

    pub fn is_degraded(&self) -> bool {
        self.swaps.iter().any(SwapReport::is_degraded)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Runs one swap worker per eligible volume, all at once.
///
/// A failing worker does not cancel its siblings: every in-flight swap runs to
/// its own terminal state, and the run as a whole fails if any of them failed.
pub struct SwapCoordinator {
    compute: Arc<dyn ComputeApi>,
    recorder: Arc<AuditRecorder>,
    locator: VolumeLocator,
    waits: WaitConfig,
    filter_delimiter: char,
}

impl SwapCoordinator {
    pub fn new(
        compute: Arc<dyn ComputeApi>,
        recorder: Arc<AuditRecorder>,
        config: &SwapConfig,
    ) -> Self {
        Self {
            locator: VolumeLocator::new(Arc::clone(&compute), config),
            compute,
            recorder,
            waits: config.waits.clone(),
            filter_delimiter: config.filter_delimiter,
        }
    }

    /// Resolves the volumes a run with this filter would swap.
    pub async fn plan(&self, instance_id: &str, volume_filter: Option<&str>) -> Vec<VolumeRef> {
        let filter = VolumeFilter::parse(volume_filter, self.filter_delimiter);
        self.locator.locate(instance_id, &filter).await
    }

    pub async fn run(&self, instance_id: &str, volume_filter: Option<&str>) -> RunOutcome {
        let volumes = self.plan(instance_id, volume_filter).await;
        self.execute(instance_id, volumes).await
    }

    pub async fn execute(&self, instance_id: &str, volumes: Vec<VolumeRef>) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let mut outcome = RunOutcome {
            run_id,
            instance_id: instance_id.to_string(),
            volumes: volumes.clone(),
            swaps: Vec::new(),
            failures: Vec::new(),
        };

        if volumes.is_empty() {
            warn!("No eligible volumes found on instance {}", instance_id);
            return outcome;
        }

        info!(
            %run_id,
            backend = self.compute.name(),
            "Swapping {} volumes on instance {}",
            volumes.len(),
            instance_id
        );

        let handles: Vec<_> = volumes
            .into_iter()
            .map(|volume| {
                let span = info_span!(
                    "swap",
                    volume_id = %volume.volume_id,
                    device = %volume.device_name
                );
                let worker = VolumeSwapWorker::new(
                    Arc::clone(&self.compute),
                    Arc::clone(&self.recorder),
                    self.waits.clone(),
                    instance_id,
                    volume.clone(),
                );
                (volume, tokio::spawn(worker.run().instrument(span)))
            })
            .collect();

        for (volume, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => outcome.swaps.push(report),
                Ok(Err(failure)) => outcome.failures.push(failure),
                Err(e) => {
                    error!("Swap task for volume {} aborted: {}", volume.volume_id, e);
                    outcome.failures.push(SwapFailure {
                        volume_id: volume.volume_id,
                        device_name: volume.device_name,
                        state: SwapState::Failed,
                        kind: FailureKind::Unexpected,
                        message: e.to_string(),
                    });
                }
            }
        }

        if outcome.failures.is_empty() {
            info!("All volume operations completed");
        } else {
            error!(
                "{} of {} volume swaps failed",
                outcome.failures.len(),
                outcome.volumes.len()
            );
        }
        outcome
    }
}
