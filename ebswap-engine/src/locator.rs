use ebswap_core::{ALL_VOLUMES_SENTINELS, ComputeApi, SwapConfig, VolumeRef};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

/// Which attached volumes a run should replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeFilter {
    All,
    Only(HashSet<String>),
}

impl VolumeFilter {
    /// Empty input or an "all" sentinel selects every volume; anything else
    /// is a `delimiter`-separated list of volume ids. A list with no ids in it
    /// selects nothing.
    pub fn parse(raw: Option<&str>, delimiter: char) -> Self {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() || ALL_VOLUMES_SENTINELS.contains(&raw) {
            return VolumeFilter::All;
        }

        VolumeFilter::Only(
            raw.split(delimiter)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn matches(&self, volume_id: &str) -> bool {
        match self {
            VolumeFilter::All => true,
            VolumeFilter::Only(ids) => ids.contains(volume_id),
        }
    }
}

pub struct VolumeLocator {
    compute: Arc<dyn ComputeApi>,
    excluded_devices: HashSet<String>,
}

impl VolumeLocator {
    pub fn new(compute: Arc<dyn ComputeApi>, config: &SwapConfig) -> Self {
        Self {
            compute,
            excluded_devices: config.excluded_devices.iter().cloned().collect(),
        }
    }

    /// Eligible attachments in the instance's enumeration order. A failed
    /// lookup is logged and yields no volumes.
    pub async fn locate(&self, instance_id: &str, filter: &VolumeFilter) -> Vec<VolumeRef> {
        let instance = match self.compute.describe_instance(instance_id).await {
            Ok(instance) => instance,
            Err(e) => {
                error!("Unable to fetch volumes for instance {}: {}", instance_id, e);
                return Vec::new();
            }
        };

        let volumes: Vec<VolumeRef> = instance
            .attachments
            .into_iter()
            .filter(|attachment| !self.excluded_devices.contains(&attachment.device_name))
            .filter_map(|attachment| {
                let volume_id = attachment.volume_id?;
                filter.matches(&volume_id).then_some(VolumeRef {
                    volume_id,
                    device_name: attachment.device_name,
                })
            })
            .collect();

        debug!(
            "Located {} eligible volumes on instance {}",
            volumes.len(),
            instance_id
        );
        volumes
    }
}
