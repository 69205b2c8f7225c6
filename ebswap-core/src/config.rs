use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Accepted volume filters meaning "every eligible volume".
pub const ALL_VOLUMES_SENTINELS: [&str; 2] = ["all", "AllVolumes"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    pub region: Option<String>,
    pub audit: AuditConfig,
    pub waits: WaitConfig,
    pub excluded_devices: Vec<String>,
    pub filter_delimiter: char,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub before_table: String,
    pub after_table: String,
    pub read_capacity: i64,
    pub write_capacity: i64,
    pub table_ready_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub snapshot_completed: WaitBudget,
    pub volume_available: WaitBudget,
}

/// Polling budget for one remote status wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitBudget {
    pub delay_secs: u64,
    pub max_attempts: u32,
}

impl WaitBudget {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for WaitBudget {
    fn default() -> Self {
        Self {
            delay_secs: 15,
            max_attempts: 40,
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            snapshot_completed: WaitBudget::default(),
            volume_available: WaitBudget::default(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            before_table: "EBSVolumeSwapBeforeSnapshot".to_string(),
            after_table: "EBSVolumeSwapApplySnapshot".to_string(),
            read_capacity: 26,
            write_capacity: 26,
            table_ready_timeout_secs: 300,
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            region: None,
            audit: AuditConfig::default(),
            waits: WaitConfig::default(),
            excluded_devices: vec!["/dev/sda1".to_string(), "/dev/xvda".to_string()],
            filter_delimiter: '|',
        }
    }
}

impl SwapConfig {
    /// Loads `path` if given, otherwise `~/.ebswap/config.yaml` when it exists,
    /// otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&config_path)?;
        let config = Self::from_yaml(&content)?;
        debug!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> crate::Result<Self> {
        let config: SwapConfig = serde_yaml::from_str(content)
            .map_err(|e| crate::SwapError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.audit.before_table.trim().is_empty() || self.audit.after_table.trim().is_empty() {
            return Err(crate::SwapError::ConfigError(
                "Audit table names must not be empty".to_string(),
            ));
        }
        if self.audit.before_table == self.audit.after_table {
            return Err(crate::SwapError::ConfigError(
                "Before and after audit tables must differ".to_string(),
            ));
        }
        for (name, budget) in [
            ("snapshot_completed", self.waits.snapshot_completed),
            ("volume_available", self.waits.volume_available),
        ] {
            if budget.max_attempts == 0 {
                return Err(crate::SwapError::ConfigError(format!(
                    "waits.{name}.max_attempts must be at least 1"
                )));
            }
        }
        if self.filter_delimiter.is_whitespace() {
            return Err(crate::SwapError::ConfigError(
                "filter_delimiter must not be whitespace".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ebswap").join("config.yaml"))
    }
}
