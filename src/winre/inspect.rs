//! Read-only discovery of the OS and WinRE partitions

use serde_json::json;

use super::agent::RecoveryAgent;
use super::error::ResizeError;
use super::events::RunResult;
use super::parsing::cmdlet::{
    DISK_SELECT, PARTITION_SELECT, SUPPORTED_SIZE_SELECT, VOLUME_SELECT,
};
use super::parsing::{CmdletDisk, CmdletPartition, CmdletSupportedSize, CmdletVolume};
use super::tool::ToolRunner;
use super::tool::powershell::{query_json, query_one};
use super::types::{
    Disk, GeometrySnapshot, ImageLocation, Partition, PartitionSizeInfo, RecoveryAgentState,
    format_size,
};

pub struct Inspector<'a> {
    runner: &'a dyn ToolRunner,
    agent: &'a RecoveryAgent<'a>,
}

impl<'a> Inspector<'a> {
    pub fn new(runner: &'a dyn ToolRunner, agent: &'a RecoveryAgent<'a>) -> Self {
        Self { runner, agent }
    }

    pub fn inspect(
        &self,
        os_drive: char,
        result: &mut RunResult,
    ) -> Result<GeometrySnapshot, ResizeError> {
        let os = self.os_partition(os_drive)?;
        result.detect(
            "winre.detect.os",
            format!(
                "OS partition {}: {} at offset {}",
                os.label(),
                format_size(os.size_bytes),
                os.offset
            ),
            json!(os),
        );

        let disk = self.disk(os.disk_number)?;
        result.detect(
            "winre.detect.disk",
            format!("Disk {} uses {}", disk.number, disk.partition_table),
            json!(disk),
        );

        let agent = self.agent.status()?;
        let winre = self.winre_partition(&agent, &disk)?;
        let winre_size = self.volume_size(&winre)?;
        result.detect(
            "winre.detect.winre",
            format!(
                "WinRE partition {}: {} capacity, {} free",
                winre.label(),
                format_size(winre_size.capacity),
                format_size(winre_size.free_space)
            ),
            json!({ "partition": winre, "size": winre_size, "agent_enabled": agent.enabled }),
        );

        let os_min_size = self.min_supported_size(&os)?;
        result.metric(
            "winre.detect.os_min",
            format!("OS partition can shrink to {}", format_size(os_min_size)),
            json!({ "bytes": os_min_size }),
        );

        Ok(GeometrySnapshot {
            disk,
            os,
            winre,
            winre_size,
            os_min_size,
            agent,
        })
    }

    pub fn os_partition(&self, letter: char) -> Result<Partition, ResizeError> {
        let pipeline = format!("Get-Partition -DriveLetter {letter} | {PARTITION_SELECT}");
        let raw: CmdletPartition =
            query_one(self.runner, &pipeline, &format!("partition for drive {letter}:"))?;
        Ok(raw.into())
    }

    pub fn disk(&self, number: u32) -> Result<Disk, ResizeError> {
        let pipeline = format!("Get-Disk -Number {number} | {DISK_SELECT}");
        let raw: CmdletDisk = query_one(self.runner, &pipeline, &format!("disk {number}"))?;
        Ok(raw.into())
    }

    /// `NotFound` when the partition does not exist
    pub fn partition(&self, disk: u32, number: u32) -> Result<Partition, ResizeError> {
        let pipeline = format!(
            "Get-Partition -DiskNumber {disk} -PartitionNumber {number} -ErrorAction SilentlyContinue | {PARTITION_SELECT}"
        );
        let raw: CmdletPartition = query_one(
            self.runner,
            &pipeline,
            &format!("disk {disk} partition {number}"),
        )?;
        Ok(raw.into())
    }

    /// All partitions, or the partitions of one disk
    pub fn partitions(&self, disk: Option<u32>) -> Result<Vec<Partition>, ResizeError> {
        let source = match disk {
            Some(number) => format!("Get-Partition -DiskNumber {number}"),
            None => "Get-Partition".to_string(),
        };
        let pipeline = format!("{source} -ErrorAction SilentlyContinue | {PARTITION_SELECT}");
        let raw: Vec<CmdletPartition> = query_json(self.runner, &pipeline)?;
        Ok(raw.into_iter().map(Partition::from).collect())
    }

    pub fn volume_size(&self, partition: &Partition) -> Result<PartitionSizeInfo, ResizeError> {
        let pipeline = format!(
            "Get-Partition -DiskNumber {} -PartitionNumber {} | Get-Volume | {VOLUME_SELECT}",
            partition.disk_number, partition.number
        );
        let volume: CmdletVolume = query_one(
            self.runner,
            &pipeline,
            &format!("volume on {}", partition.label()),
        )?;
        Ok(PartitionSizeInfo::from(&volume))
    }

    pub fn min_supported_size(&self, partition: &Partition) -> Result<u64, ResizeError> {
        let pipeline = format!(
            "Get-PartitionSupportedSize -DiskNumber {} -PartitionNumber {} | {SUPPORTED_SIZE_SELECT}",
            partition.disk_number, partition.number
        );
        let sizes: CmdletSupportedSize = query_one(
            self.runner,
            &pipeline,
            &format!("supported sizes of {}", partition.label()),
        )?;
        Ok(sizes.size_min)
    }

    /// Live agent location first, then the offset persisted in ReAgent.xml
    fn winre_partition(
        &self,
        agent: &RecoveryAgentState,
        disk: &Disk,
    ) -> Result<Partition, ResizeError> {
        if let Some(ImageLocation {
            disk: Some(d),
            partition: Some(p),
            ..
        }) = &agent.location
        {
            return self.partition(*d, *p);
        }

        let Some(location) = self.agent.persisted_location()? else {
            return Err(ResizeError::NotFound(format!(
                "WinRE location: the recovery agent reports none and {} has no usable entry",
                self.agent.metadata_path().display()
            )));
        };
        let Some(offset) = location.offset else {
            return Err(ResizeError::NotFound("WinRE partition offset".to_string()));
        };

        let on_os_disk = self.partitions(Some(disk.number))?;
        if let Some(found) = on_os_disk.into_iter().find(|p| p.offset == offset) {
            return Ok(found);
        }
        self.partitions(None)?
            .into_iter()
            .find(|p| p.offset == offset)
            .ok_or_else(|| ResizeError::NotFound(format!("partition at offset {offset}")))
    }
}
