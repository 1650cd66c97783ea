use std::io::Write;

use crate::common::shell::ps_quote;
use crate::winre::error::ResizeError;
use crate::winre::parsing::cmdlet::PARTITION_SELECT;
use crate::winre::parsing::diskpart::ERROR_MARKER;
use crate::winre::parsing::{CmdletPartition, build_recovery_script, diskpart_succeeded};
use crate::winre::tool::powershell::query_json;
use crate::winre::tool::{ExternalToolResult, ToolRunner};
use crate::winre::types::MIB;

use super::{PartitionHandle, RECOVERY_LABEL, RecoveryPartitionCreator, SettlePolicy, wait_until};

pub const DISKPART: &str = "diskpart.exe";

/// The storage cmdlets cannot set MBR type 0x27, so this goes through a
/// diskpart script and then finds the partition again by its volume label.
pub struct MbrRecoveryCreator<'a> {
    runner: &'a dyn ToolRunner,
    disk_number: u32,
    /// Where the planner expects the new partition to start
    expected_offset: u64,
    settle: SettlePolicy,
}

impl<'a> MbrRecoveryCreator<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        disk_number: u32,
        expected_offset: u64,
        settle: SettlePolicy,
    ) -> Self {
        Self {
            runner,
            disk_number,
            expected_offset,
            settle,
        }
    }

    fn run_script(&self, script: &str) -> Result<ExternalToolResult, ResizeError> {
        let mut file = tempfile::Builder::new()
            .prefix("winre-resize-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(script.as_bytes())?;
        file.flush()?;
        // Close our handle so diskpart can open the file; deleted on drop
        let path = file.into_temp_path();

        let args = vec!["/s".to_string(), path.to_string_lossy().into_owned()];
        self.runner.run(DISKPART, &args)
    }

    /// Other volumes may carry the same label (OEM recovery images); take the
    /// one that is large enough and closest to the planned offset
    fn find_created(&self, size: u64) -> Result<PartitionHandle, ResizeError> {
        let pipeline = format!(
            "Get-Volume -FileSystemLabel {} -ErrorAction SilentlyContinue | Get-Partition | \
             Where-Object {{ $_.DiskNumber -eq {} }} | {PARTITION_SELECT}",
            ps_quote(RECOVERY_LABEL),
            self.disk_number,
        );
        wait_until(&self.settle, "the new recovery volume", || {
            let found: Vec<CmdletPartition> = query_json(self.runner, &pipeline)?;
            Ok(closest_candidate(&found, self.expected_offset, size).map(PartitionHandle::from))
        })
    }
}

/// diskpart sizes in whole MB, so allow one MiB of slack on the size
fn closest_candidate(
    found: &[CmdletPartition],
    expected_offset: u64,
    size: u64,
) -> Option<&CmdletPartition> {
    found
        .iter()
        .filter(|p| p.size + MIB >= size)
        .min_by_key(|p| p.offset.abs_diff(expected_offset))
}

fn failure_detail(result: &ExternalToolResult) -> String {
    result
        .stdout
        .lines()
        .find(|line| line.contains(ERROR_MARKER))
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| {
            let detail = result.detail();
            if detail.is_empty() {
                "no completion marker in diskpart output".to_string()
            } else {
                detail
            }
        })
}

impl RecoveryPartitionCreator for MbrRecoveryCreator<'_> {
    fn create_recovery_partition(&self, size: u64) -> Result<PartitionHandle, ResizeError> {
        let size_mb = size.div_ceil(MIB);
        let script = build_recovery_script(self.disk_number, size_mb, RECOVERY_LABEL);

        let output = self.run_script(&script)?;
        if !diskpart_succeeded(&output) {
            return Err(ResizeError::tool_failed(
                "diskpart",
                output.exit_code,
                failure_detail(&output),
            ));
        }

        self.find_created(size_mb * MIB)
    }
}
