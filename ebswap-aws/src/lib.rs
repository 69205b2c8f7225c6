mod dynamo;
mod ec2;


use aws_config::{BehaviorVersion, Region, SdkConfig};

pub use dynamo::DynamoAuditStore;
pub use ec2::Ec2Compute;

/// Loads credentials and endpoint configuration from the environment, pinned
/// to `region` when one is given.
pub async fn load_sdk_config(region: Option<String>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    loader.load().await
}
