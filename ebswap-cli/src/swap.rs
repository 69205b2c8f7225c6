use crate::output::{OutputFormat, VolumeRow, print_info, print_outcome, print_warning};
use anyhow::Context;
use ebswap_aws::{DynamoAuditStore, Ec2Compute, load_sdk_config};
use ebswap_core::{AuditStore, ComputeApi, Console, SwapConfig};
use ebswap_engine::{AuditRecorder, SwapCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct SwapArgs {
    pub region: String,
    pub instance_id: String,
    pub volume_ids: String,
    pub config: Option<PathBuf>,
    pub dry_run: bool,
}

/// Runs the swap and returns the process exit code.
pub async fn execute(args: SwapArgs, format: OutputFormat, console: &Console) -> anyhow::Result<i32> {
    let config = SwapConfig::load(args.config.as_deref())
        .context("failed to load configuration")?
        .with_region(&args.region);

    info!(
        region = %args.region,
        instance_id = %args.instance_id,
        volume_ids = %args.volume_ids,
        "Starting volume swap"
    );

    let sdk_config = load_sdk_config(config.region.clone()).await;
    let compute: Arc<dyn ComputeApi> = Arc::new(Ec2Compute::new(&sdk_config));
    let store: Arc<dyn AuditStore> = Arc::new(DynamoAuditStore::new(&sdk_config, &config.audit));
    let recorder = Arc::new(AuditRecorder::new(store, &config.audit));
    let coordinator = SwapCoordinator::new(compute, Arc::clone(&recorder), &config);

    let volumes = coordinator
        .plan(&args.instance_id, Some(args.volume_ids.as_str()))
        .await;
    if volumes.is_empty() {
        print_warning(console, "No eligible volumes found.");
        return Ok(0);
    }

    print_info(console, "The following volumes will be processed:");
    let rows: Vec<VolumeRow> = volumes.iter().map(VolumeRow::from).collect();
    console.line(&format.rows(rows));

    if args.dry_run {
        print_info(console, "Dry run: no snapshots, volumes or audit tables were changed");
        return Ok(0);
    }

    recorder
        .ensure_tables()
        .await
        .context("failed to prepare audit tables")?;

    let outcome = coordinator.execute(&args.instance_id, volumes).await;
    print_outcome(console, format, &outcome);
    Ok(outcome.exit_code())
}
