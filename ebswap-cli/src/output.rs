use clap::ValueEnum;
use colored::*;
use ebswap_core::{Console, VolumeRef};
use ebswap_engine::{RunOutcome, SwapFailure, SwapReport};
use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Machine-readable rendering; `None` for the human table view.
    pub fn serialize<T: Serialize>(&self, data: &T) -> Option<String> {
        match self {
            OutputFormat::Table => None,
            OutputFormat::Json => {
                Some(serde_json::to_string_pretty(data).unwrap_or_else(|e| e.to_string()))
            }
            OutputFormat::Yaml => Some(serde_yaml::to_string(data).unwrap_or_else(|e| e.to_string())),
        }
    }

    pub fn rows<T: Tabled + Serialize>(&self, rows: Vec<T>) -> String {
        match self.serialize(&rows) {
            Some(text) => text,
            None if rows.is_empty() => "No data to display".to_string(),
            None => Table::new(rows).to_string(),
        }
    }
}

#[derive(Tabled, Serialize)]
pub struct VolumeRow {
    #[tabled(rename = "VOLUME")]
    pub volume_id: String,
    #[tabled(rename = "DEVICE")]
    pub device_name: String,
}

impl From<&VolumeRef> for VolumeRow {
    fn from(volume: &VolumeRef) -> Self {
        Self {
            volume_id: volume.volume_id.clone(),
            device_name: volume.device_name.clone(),
        }
    }
}

#[derive(Tabled, Serialize)]
pub struct SwapRow {
    #[tabled(rename = "OLD VOLUME")]
    pub old_volume_id: String,
    #[tabled(rename = "NEW VOLUME")]
    pub new_volume_id: String,
    #[tabled(rename = "SNAPSHOT")]
    pub snapshot_id: String,
    #[tabled(rename = "DEVICE")]
    pub device_name: String,
    #[tabled(rename = "AUDIT")]
    pub audit: String,
}

impl From<&SwapReport> for SwapRow {
    fn from(report: &SwapReport) -> Self {
        Self {
            old_volume_id: report.old_volume_id.clone(),
            new_volume_id: report.new_volume_id.clone(),
            snapshot_id: report.snapshot_id.clone(),
            device_name: report.device_name.clone(),
            audit: if report.is_degraded() {
                "degraded".to_string()
            } else {
                "recorded".to_string()
            },
        }
    }
}

#[derive(Tabled, Serialize)]
pub struct FailureRow {
    #[tabled(rename = "VOLUME")]
    pub volume_id: String,
    #[tabled(rename = "DEVICE")]
    pub device_name: String,
    #[tabled(rename = "FAILED AFTER")]
    pub state: String,
    #[tabled(rename = "KIND")]
    pub kind: String,
    #[tabled(rename = "ERROR")]
    pub message: String,
}

impl From<&SwapFailure> for FailureRow {
    fn from(failure: &SwapFailure) -> Self {
        Self {
            volume_id: failure.volume_id.clone(),
            device_name: failure.device_name.clone(),
            state: failure.state.to_string(),
            kind: failure.kind.to_string(),
            message: failure.message.clone(),
        }
    }
}

/// Prints the final run summary.
pub fn print_outcome(console: &Console, format: OutputFormat, outcome: &RunOutcome) {
    if let Some(text) = format.serialize(outcome) {
        console.line(&text);
        return;
    }

    if !outcome.swaps.is_empty() {
        let rows: Vec<SwapRow> = outcome.swaps.iter().map(SwapRow::from).collect();
        console.line(&format.rows(rows));
    }
    if !outcome.failures.is_empty() {
        let rows: Vec<FailureRow> = outcome.failures.iter().map(FailureRow::from).collect();
        console.line(&format.rows(rows));
    }

    if outcome.is_success() && outcome.is_degraded() {
        print_warning(console, "All volumes swapped, but some audit rows were not written");
    } else if outcome.is_success() {
        print_success(console, "All volume operations completed");
    } else {
        print_error(
            console,
            &format!(
                "{} of {} volume swaps failed",
                outcome.failures.len(),
                outcome.volumes.len()
            ),
        );
    }
}

pub fn print_success(console: &Console, message: &str) {
    console.line(&format!("{} {}", "✓".green(), message));
}

pub fn print_error(console: &Console, message: &str) {
    console.line(&format!("{} {}", "✗".red(), message));
}

pub fn print_warning(console: &Console, message: &str) {
    console.line(&format!("{} {}", "⚠".yellow(), message));
}

pub fn print_info(console: &Console, message: &str) {
    console.line(&format!("{} {}", "ℹ".blue(), message));
}
