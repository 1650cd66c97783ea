//! Partition changes that carry out a [`ResizePlan`]
//!
//! Order matters: shrink the OS partition, delete the old WinRE partition,
//! then create the new one. Nothing here rolls back a completed step.

mod gpt;
mod mbr;
pub mod settle;

use serde::Serialize;
use serde_json::json;

use super::error::ResizeError;
use super::events::{EventKind, RunResult};
use super::parsing::CmdletPartition;
use super::parsing::cmdlet::PARTITION_SELECT;
use super::plan::ResizePlan;
use super::tool::ToolRunner;
use super::tool::powershell::{query_json, run_script};
use super::types::{DiskStyle, format_size};

pub use gpt::GptRecoveryCreator;
pub use mbr::MbrRecoveryCreator;
pub use settle::{SettlePolicy, wait_until};

/// Volume label given to the new recovery partition
pub const RECOVERY_LABEL: &str = "Recovery";

/// Where the new recovery partition ended up
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PartitionHandle {
    pub disk_number: u32,
    pub partition_number: u32,
    pub offset: u64,
    pub size: u64,
}

impl From<&CmdletPartition> for PartitionHandle {
    fn from(p: &CmdletPartition) -> Self {
        Self {
            disk_number: p.disk_number,
            partition_number: p.partition_number,
            offset: p.offset,
            size: p.size,
        }
    }
}

/// Creates and formats the recovery partition, marked the way the disk style needs
pub trait RecoveryPartitionCreator {
    fn create_recovery_partition(&self, size: u64) -> Result<PartitionHandle, ResizeError>;
}

pub struct PartitionMutator<'a> {
    runner: &'a dyn ToolRunner,
    settle: SettlePolicy,
}

impl<'a> PartitionMutator<'a> {
    pub fn new(runner: &'a dyn ToolRunner, settle: SettlePolicy) -> Self {
        Self { runner, settle }
    }

    fn creator(&self, plan: &ResizePlan) -> Box<dyn RecoveryPartitionCreator + 'a> {
        match plan.disk_style {
            DiskStyle::Gpt => Box::new(GptRecoveryCreator::new(
                self.runner,
                plan.disk_number,
                plan.new_partition_offset,
            )),
            DiskStyle::Mbr => Box::new(MbrRecoveryCreator::new(
                self.runner,
                plan.disk_number,
                plan.new_partition_offset,
                self.settle,
            )),
        }
    }

    pub fn execute(
        &self,
        plan: &ResizePlan,
        result: &mut RunResult,
    ) -> Result<PartitionHandle, ResizeError> {
        if plan.needs_shrink_os {
            self.shrink_os(plan)?;
            result.success(
                "winre.mutate.shrink",
                format!(
                    "Shrank OS partition {} to {}",
                    plan.os_partition_number,
                    format_size(plan.target_os_partition_size)
                ),
            );
        } else {
            result.status("winre.mutate.shrink_skipped", "OS partition keeps its size");
        }

        if plan.delete_old_winre {
            self.delete_winre(plan)?;
            result.success(
                "winre.mutate.delete",
                format!("Deleted old WinRE partition {}", plan.winre_partition_number),
            );
        } else {
            result.status(
                "winre.mutate.delete_skipped",
                format!(
                    "Keeping system/active partition {}",
                    plan.winre_partition_number
                ),
            );
        }

        let handle = self
            .creator(plan)
            .create_recovery_partition(plan.target_winre_partition_size)?;
        result.record(
            EventKind::Success,
            "winre.mutate.create",
            format!(
                "Created {} recovery partition {} on disk {}",
                format_size(handle.size),
                handle.partition_number,
                handle.disk_number
            ),
            Some(json!(handle)),
        );
        Ok(handle)
    }

    fn shrink_os(&self, plan: &ResizePlan) -> Result<(), ResizeError> {
        run_script(
            self.runner,
            &format!(
                "Resize-Partition -DiskNumber {} -PartitionNumber {} -Size {}",
                plan.disk_number, plan.os_partition_number, plan.target_os_partition_size
            ),
        )?;
        Ok(())
    }

    fn delete_winre(&self, plan: &ResizePlan) -> Result<(), ResizeError> {
        run_script(
            self.runner,
            &format!(
                "Remove-Partition -DiskNumber {} -PartitionNumber {} -Confirm:$false",
                plan.disk_number, plan.winre_partition_number
            ),
        )?;

        // Numbers can shift on MBR disks, the offset cannot
        let listing = format!(
            "Get-Partition -DiskNumber {} -ErrorAction SilentlyContinue | {PARTITION_SELECT}",
            plan.disk_number
        );
        wait_until(&self.settle, "the old WinRE partition to disappear", || {
            let partitions: Vec<CmdletPartition> = query_json(self.runner, &listing)?;
            let still_there = partitions
                .iter()
                .any(|p| p.offset == plan.winre_partition_offset);
            Ok((!still_there).then_some(()))
        })
    }
}
