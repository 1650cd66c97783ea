//! Optional TOML configuration
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Command line flags override whatever is loaded here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::paths;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResizeConfig {
    /// Where WinRE contents are copied before the old partition is deleted
    pub backup_dir: Option<PathBuf>,
    /// Reboot once the resize has completed
    pub force_reboot: bool,
    pub reboot_delay_secs: u32,
    /// Recovery agent metadata file
    pub reagent_xml: Option<PathBuf>,
    /// How long to wait for the partition table to reflect a change
    pub settle_timeout_secs: u64,
    pub settle_interval_ms: u64,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            backup_dir: None,
            force_reboot: false,
            reboot_delay_secs: Self::DEFAULT_REBOOT_DELAY_SECS,
            reagent_xml: None,
            settle_timeout_secs: Self::DEFAULT_SETTLE_TIMEOUT_SECS,
            settle_interval_ms: Self::DEFAULT_SETTLE_INTERVAL_MS,
        }
    }
}

impl ResizeConfig {
    pub const DEFAULT_REBOOT_DELAY_SECS: u32 = 60;
    pub const DEFAULT_SETTLE_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 1000;

    /// Load from an explicit path (must exist) or the default path (may be absent)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Configuration file not found: {}", path.display());
                }
                Self::load_from_path(path)
            }
            None => {
                let path = paths::default_config_path()?;
                if path.exists() {
                    Self::load_from_path(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing winre-resize config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.settle_interval_ms == 0 {
            anyhow::bail!("settle_interval_ms must be greater than zero");
        }
        if self.settle_timeout_secs == 0 {
            anyhow::bail!("settle_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }
}
