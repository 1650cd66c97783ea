//! Core data structures for WinRE partition geometry

use serde::{Deserialize, Serialize};

use super::error::ResizeError;

pub const MIB: u64 = 1024 * 1024;

/// Free space the WinRE volume must have once the run completes (250 MiB)
pub const WINRE_INCREMENT: u64 = 250 * MIB;

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Round up to the next whole MiB
pub fn round_up_mib(bytes: u64) -> u64 {
    bytes.div_ceil(MIB) * MIB
}

/// Partition table type as reported by the storage stack
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PartitionTableType {
    GPT,
    MBR,
    RAW,
    Unknown(String),
}

impl PartitionTableType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "GPT" => PartitionTableType::GPT,
            "MBR" => PartitionTableType::MBR,
            "RAW" => PartitionTableType::RAW,
            other => PartitionTableType::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for PartitionTableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionTableType::GPT => write!(f, "GPT"),
            PartitionTableType::MBR => write!(f, "MBR"),
            PartitionTableType::RAW => write!(f, "RAW"),
            PartitionTableType::Unknown(raw) => write!(f, "Unknown ({raw})"),
        }
    }
}

/// Disk styles the resize procedure knows how to handle
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum DiskStyle {
    Mbr,
    Gpt,
}

impl TryFrom<&PartitionTableType> for DiskStyle {
    type Error = ResizeError;

    fn try_from(value: &PartitionTableType) -> Result<Self, Self::Error> {
        match value {
            PartitionTableType::GPT => Ok(DiskStyle::Gpt),
            PartitionTableType::MBR => Ok(DiskStyle::Mbr),
            other => Err(ResizeError::UnsupportedDiskStyle(other.to_string())),
        }
    }
}

impl std::fmt::Display for DiskStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiskStyle::Mbr => write!(f, "MBR"),
            DiskStyle::Gpt => write!(f, "GPT"),
        }
    }
}

/// A physical disk
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Disk {
    /// Disk index (e.g. 0 for \\.\PhysicalDrive0)
    pub number: u32,
    pub partition_table: PartitionTableType,
    pub size_bytes: u64,
    /// Disk GUID on GPT disks
    pub guid: Option<String>,
}

/// A partition on a disk
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Partition {
    pub disk_number: u32,
    pub number: u32,
    /// Byte offset from the start of the disk
    pub offset: u64,
    pub size_bytes: u64,
    /// MBR active flag, or the GPT System type
    pub is_system_or_active: bool,
    pub drive_letter: Option<char>,
    /// Mount points, drive roots and volume GUID paths
    pub access_paths: Vec<String>,
}

impl Partition {
    /// First byte after the partition
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size_bytes)
    }

    pub fn is_same(&self, other: &Partition) -> bool {
        self.disk_number == other.disk_number && self.number == other.number
    }

    pub fn label(&self) -> String {
        format!("disk {} partition {}", self.disk_number, self.number)
    }
}

/// Capacity and free space of the volume on a partition
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PartitionSizeInfo {
    pub capacity: u64,
    pub free_space: u64,
}

/// Where the recovery agent believes the WinRE image lives
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct ImageLocation {
    pub disk: Option<u32>,
    pub partition: Option<u32>,
    pub path: String,
    pub guid: Option<String>,
    pub offset: Option<u64>,
}

/// Recovery agent status, from a live query or the persisted metadata file
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct RecoveryAgentState {
    pub enabled: bool,
    pub location: Option<ImageLocation>,
}

/// Everything the planner needs, read in one pass before any change
#[derive(Debug, Clone, Serialize)]
pub struct GeometrySnapshot {
    pub disk: Disk,
    pub os: Partition,
    pub winre: Partition,
    pub winre_size: PartitionSizeInfo,
    /// Smallest size the OS partition may be shrunk to
    pub os_min_size: u64,
    pub agent: RecoveryAgentState,
}
