use crate::common::shell::ps_quote;
use crate::winre::error::ResizeError;
use crate::winre::parsing::CmdletPartition;
use crate::winre::parsing::cmdlet::PARTITION_SELECT;
use crate::winre::tool::ToolRunner;
use crate::winre::tool::powershell::query_one;

use super::{PartitionHandle, RECOVERY_LABEL, RecoveryPartitionCreator};

/// GPT partition type of a Windows recovery partition
pub const GPT_RECOVERY_TYPE: &str = "{de94bba4-06d1-4d40-a16a-bfd50179d6ac}";

/// `New-Partition` with the recovery type GUID, then `Format-Volume`
pub struct GptRecoveryCreator<'a> {
    runner: &'a dyn ToolRunner,
    disk_number: u32,
    offset: u64,
}

impl<'a> GptRecoveryCreator<'a> {
    pub fn new(runner: &'a dyn ToolRunner, disk_number: u32, offset: u64) -> Self {
        Self {
            runner,
            disk_number,
            offset,
        }
    }

    fn script(&self, size: u64) -> String {
        format!(
            "$p = New-Partition -DiskNumber {} -Offset {} -Size {} -GptType {}; \
             $null = $p | Format-Volume -FileSystem NTFS -NewFileSystemLabel {} -Confirm:$false; \
             $p | {PARTITION_SELECT}",
            self.disk_number,
            self.offset,
            size,
            ps_quote(GPT_RECOVERY_TYPE),
            ps_quote(RECOVERY_LABEL)
        )
    }
}

impl RecoveryPartitionCreator for GptRecoveryCreator<'_> {
    fn create_recovery_partition(&self, size: u64) -> Result<PartitionHandle, ResizeError> {
        // New-Partition hands back the partition object, so the number is known directly
        let created: CmdletPartition =
            query_one(self.runner, &self.script(size), "newly created recovery partition")?;
        Ok(PartitionHandle::from(&created))
    }
}
