use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{ResourceType, Tag, TagSpecification, Volume, VolumeType};
use ebswap_core::{
    BlockDeviceAttachment, ComputeApi, CreateVolumeRequest, InstanceDescription, Result,
    SnapshotState, SwapError, TagSet, VolumeDescription, VolumeState,
};
use tracing::debug;

/// [`ComputeApi`] backed by the EC2 control API.
pub struct Ec2Compute {
    client: Client,
}

impl Ec2Compute {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

fn rejected<E>(operation: &str, resource: &str, err: E) -> SwapError
where
    E: std::error::Error,
{
    SwapError::rejected(operation, resource, DisplayErrorContext(err).to_string())
}

fn missing(operation: &str, resource: &str, field: &str) -> SwapError {
    SwapError::Unexpected(format!("{operation} returned no {field} for {resource}"))
}

pub(crate) fn to_volume_description(volume_id: &str, volume: &Volume) -> Result<VolumeDescription> {
    Ok(VolumeDescription {
        volume_id: volume_id.to_string(),
        size: volume
            .size()
            .ok_or_else(|| missing("DescribeVolumes", volume_id, "size"))?,
        iops: volume.iops(),
        throughput: volume.throughput(),
        volume_type: volume
            .volume_type()
            .map(|t| t.as_str().to_string())
            .ok_or_else(|| missing("DescribeVolumes", volume_id, "volume type"))?,
        availability_zone: volume
            .availability_zone()
            .ok_or_else(|| missing("DescribeVolumes", volume_id, "availability zone"))?
            .to_string(),
        encrypted: volume.encrypted().unwrap_or(false),
        kms_key_id: volume.kms_key_id().map(str::to_string),
        tags: from_tags(volume.tags()),
    })
}

pub(crate) fn to_tags(tags: &TagSet) -> Vec<Tag> {
    tags.iter()
        .map(|(key, value)| Tag::builder().key(key).value(value).build())
        .collect()
}

pub(crate) fn from_tags(tags: &[Tag]) -> TagSet {
    tags.iter()
        .filter_map(|tag| {
            let key = tag.key()?;
            Some((key.to_string(), tag.value().unwrap_or_default().to_string()))
        })
        .collect()
}

/// IOPS may only be provisioned on these volume types.
pub(crate) fn supports_iops(volume_type: &str) -> bool {
    matches!(volume_type, "io1" | "io2" | "gp3")
}

pub(crate) fn supports_throughput(volume_type: &str) -> bool {
    volume_type == "gp3"
}

#[async_trait]
impl ComputeApi for Ec2Compute {
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceDescription> {
        let output = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| rejected("DescribeInstances", instance_id, e))?;

        let instance = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .next()
            .ok_or_else(|| {
                SwapError::rejected("DescribeInstances", instance_id, "instance not found")
            })?;

        let attachments = instance
            .block_device_mappings()
            .iter()
            .filter_map(|mapping| {
                Some(BlockDeviceAttachment {
                    device_name: mapping.device_name()?.to_string(),
                    volume_id: mapping
                        .ebs()
                        .and_then(|ebs| ebs.volume_id())
                        .map(str::to_string),
                })
            })
            .collect();

        Ok(InstanceDescription {
            instance_id: instance_id.to_string(),
            attachments,
            security_group_names: instance
                .security_groups()
                .iter()
                .filter_map(|group| group.group_name())
                .map(str::to_string)
                .collect(),
            tags: from_tags(instance.tags()),
        })
    }

    async fn describe_volume(&self, volume_id: &str) -> Result<VolumeDescription> {
        let output = self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .map_err(|e| rejected("DescribeVolumes", volume_id, e))?;

        let volume = output
            .volumes()
            .first()
            .ok_or_else(|| SwapError::rejected("DescribeVolumes", volume_id, "volume not found"))?;
        to_volume_description(volume_id, volume)
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> Result<String> {
        let output = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .send()
            .await
            .map_err(|e| rejected("CreateSnapshot", volume_id, e))?;

        output
            .snapshot_id()
            .map(str::to_string)
            .ok_or_else(|| missing("CreateSnapshot", volume_id, "snapshot id"))
    }

    async fn snapshot_state(&self, snapshot_id: &str) -> Result<SnapshotState> {
        let output = self
            .client
            .describe_snapshots()
            .snapshot_ids(snapshot_id)
            .send()
            .await
            .map_err(|e| rejected("DescribeSnapshots", snapshot_id, e))?;

        output
            .snapshots()
            .first()
            .and_then(|snapshot| snapshot.state())
            .map(|state| SnapshotState::parse(state.as_str()))
            .ok_or_else(|| missing("DescribeSnapshots", snapshot_id, "state"))
    }

    async fn create_tags(&self, resource_id: &str, tags: &TagSet) -> Result<()> {
        debug!("Tagging {} with {} tags", resource_id, tags.len());
        self.client
            .create_tags()
            .resources(resource_id)
            .set_tags(Some(to_tags(tags)))
            .send()
            .await
            .map_err(|e| rejected("CreateTags", resource_id, e))?;
        Ok(())
    }

    async fn create_volume(&self, request: &CreateVolumeRequest) -> Result<String> {
        let mut builder = self
            .client
            .create_volume()
            .snapshot_id(&request.snapshot_id)
            .availability_zone(&request.availability_zone)
            .volume_type(VolumeType::from(request.volume_type.as_str()))
            .encrypted(request.encrypted)
            .size(request.size)
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Volume)
                    .set_tags(Some(to_tags(&request.tags)))
                    .build(),
            );

        if request.encrypted {
            if let Some(key_id) = &request.key_id {
                builder = builder.kms_key_id(key_id);
            }
        }
        if request.iops > 0 && supports_iops(&request.volume_type) {
            builder = builder.iops(request.iops);
        }
        if request.throughput > 0 && supports_throughput(&request.volume_type) {
            builder = builder.throughput(request.throughput);
        }

        let output = builder
            .send()
            .await
            .map_err(|e| rejected("CreateVolume", &request.snapshot_id, e))?;

        output
            .volume_id()
            .map(str::to_string)
            .ok_or_else(|| missing("CreateVolume", &request.snapshot_id, "volume id"))
    }

    async fn volume_state(&self, volume_id: &str) -> Result<VolumeState> {
        let output = self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .map_err(|e| rejected("DescribeVolumes", volume_id, e))?;

        output
            .volumes()
            .first()
            .and_then(|volume| volume.state())
            .map(|state| VolumeState::parse(state.as_str()))
            .ok_or_else(|| missing("DescribeVolumes", volume_id, "state"))
    }

    async fn detach_volume(&self, volume_id: &str, instance_id: &str, force: bool) -> Result<()> {
        self.client
            .detach_volume()
            .volume_id(volume_id)
            .instance_id(instance_id)
            .force(force)
            .send()
            .await
            .map_err(|e| rejected("DetachVolume", volume_id, e))?;
        Ok(())
    }

    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()> {
        self.client
            .attach_volume()
            .volume_id(volume_id)
            .instance_id(instance_id)
            .device(device)
            .send()
            .await
            .map_err(|e| rejected("AttachVolume", volume_id, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "ec2"
    }
}
