//! Post-resize verification
//!
//! Re-reads the final state once the partitions have been changed and the
//! agent re-enabled. Anything unexpected is reported as a warning: by the
//! time this runs the physical resize is done and cannot be undone.

use serde::Serialize;
use serde_json::json;

use super::agent::RecoveryAgent;
use super::error::ResizeError;
use super::events::{EventKind, RunResult};
use super::inspect::Inspector;
use super::mutate::PartitionHandle;
use super::plan::ResizePlan;
use super::types::{ImageLocation, PartitionSizeInfo, format_size};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VerificationReport {
    pub agent_enabled: bool,
    /// Partition the agent now points at, if it reports one
    pub winre_partition: Option<u32>,
    pub winre_size: Option<PartitionSizeInfo>,
    pub os_size: Option<u64>,
    pub warnings: Vec<String>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub struct ResizeVerifier<'a> {
    inspector: &'a Inspector<'a>,
    agent: &'a RecoveryAgent<'a>,
    increment: u64,
}

impl<'a> ResizeVerifier<'a> {
    pub fn new(inspector: &'a Inspector<'a>, agent: &'a RecoveryAgent<'a>, increment: u64) -> Self {
        Self {
            inspector,
            agent,
            increment,
        }
    }

    pub fn check(
        &self,
        plan: &ResizePlan,
        created: &PartitionHandle,
        result: &mut RunResult,
    ) -> Result<VerificationReport, ResizeError> {
        let mut warnings = Vec::new();

        let state = self.agent.status()?;
        if !state.enabled {
            warnings.push("Recovery agent is still disabled".to_string());
        }

        let winre_partition = match &state.location {
            Some(ImageLocation {
                partition: Some(number),
                ..
            }) => Some(*number),
            _ => None,
        };
        let actual = winre_partition.unwrap_or(created.partition_number);
        if actual != plan.predicted_partition_number {
            warnings.push(format!(
                "New WinRE partition is number {actual}, expected {}",
                plan.predicted_partition_number
            ));
        }

        let winre = self.inspector.partition(created.disk_number, actual)?;
        let winre_size = match self.inspector.volume_size(&winre) {
            Ok(size) => {
                if size.free_space < self.increment {
                    warnings.push(format!(
                        "WinRE volume has {} free, less than {}",
                        format_size(size.free_space),
                        format_size(self.increment)
                    ));
                }
                Some(size)
            }
            Err(e) => {
                warnings.push(format!("Could not read the WinRE volume size: {e}"));
                None
            }
        };

        let os = self
            .inspector
            .partition(plan.disk_number, plan.os_partition_number)
            .ok();
        let os_size = os.as_ref().map(|p| p.size_bytes);
        match os_size {
            Some(size) if size != plan.target_os_partition_size => warnings.push(format!(
                "OS partition is {}, expected {}",
                format_size(size),
                format_size(plan.target_os_partition_size)
            )),
            Some(_) => {}
            None => warnings.push(format!(
                "Could not re-read OS partition {}",
                plan.os_partition_number
            )),
        }

        for warning in &warnings {
            result.warning("winre.verify.mismatch", warning.clone());
        }

        let report = VerificationReport {
            agent_enabled: state.enabled,
            winre_partition,
            winre_size,
            os_size,
            warnings,
        };
        if report.is_clean() {
            result.record(
                EventKind::Success,
                "winre.verify.ok",
                "Final layout matches the plan",
                Some(json!(report)),
            );
        }
        Ok(report)
    }
}
