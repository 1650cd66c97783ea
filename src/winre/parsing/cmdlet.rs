//! JSON shapes of the storage cmdlets
//!
//! Enum-typed properties are projected to strings in the `Select-Object`
//! clauses below, otherwise Windows PowerShell serializes them as numbers.

use serde::Deserialize;

use crate::winre::types::{Disk, Partition, PartitionSizeInfo, PartitionTableType};

pub const PARTITION_SELECT: &str = "Select-Object DiskNumber, PartitionNumber, Offset, Size, \
     IsSystem, IsActive, GptType, @{n='DriveLetter';e={[string]$_.DriveLetter}}, AccessPaths";

pub const DISK_SELECT: &str =
    "Select-Object Number, Size, Guid, @{n='PartitionStyle';e={[string]$_.PartitionStyle}}";

pub const VOLUME_SELECT: &str = "Select-Object Size, SizeRemaining";

pub const SUPPORTED_SIZE_SELECT: &str = "Select-Object SizeMin";

/// GPT type of the EFI system partition
pub const GPT_SYSTEM_TYPE: &str = "{c12a7328-f81f-11d2-ba4b-00a0c93ec93b}";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CmdletPartition {
    pub disk_number: u32,
    pub partition_number: u32,
    pub offset: u64,
    pub size: u64,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub gpt_type: Option<String>,
    #[serde(default)]
    pub drive_letter: Option<String>,
    #[serde(default)]
    pub access_paths: Option<Vec<String>>,
}

impl From<CmdletPartition> for Partition {
    fn from(p: CmdletPartition) -> Self {
        // No letter comes back as "" or a NUL character
        let drive_letter = p
            .drive_letter
            .as_deref()
            .and_then(|s| s.chars().next())
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_uppercase());

        let is_system_or_active = p.is_system
            || p.is_active
            || p
                .gpt_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(GPT_SYSTEM_TYPE));

        Partition {
            disk_number: p.disk_number,
            number: p.partition_number,
            offset: p.offset,
            size_bytes: p.size,
            is_system_or_active,
            drive_letter,
            access_paths: p.access_paths.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CmdletDisk {
    pub number: u32,
    pub size: u64,
    #[serde(default)]
    pub guid: Option<String>,
    pub partition_style: String,
}

impl From<CmdletDisk> for Disk {
    fn from(d: CmdletDisk) -> Self {
        Disk {
            number: d.number,
            partition_table: PartitionTableType::parse(&d.partition_style),
            size_bytes: d.size,
            guid: d.guid.filter(|g| !g.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CmdletVolume {
    pub size: u64,
    pub size_remaining: u64,
}

impl From<&CmdletVolume> for PartitionSizeInfo {
    fn from(v: &CmdletVolume) -> Self {
        PartitionSizeInfo {
            capacity: v.size,
            free_space: v.size_remaining,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CmdletSupportedSize {
    pub size_min: u64,
}
