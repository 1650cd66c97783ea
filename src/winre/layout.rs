//! Relative placement of the OS and WinRE partitions

use serde::Serialize;

use super::types::{Disk, Partition, PartitionTableType};

/// Geometry facts the planner decides on
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Layout {
    pub disk_style: PartitionTableType,
    pub disk_number: u32,
    /// WinRE lives on the OS disk
    pub same_disk: bool,
    /// WinRE is a folder on the OS partition itself
    pub is_same_partition: bool,
    pub winre_is_system_or_active: bool,
    pub winre_precedes_os: bool,
    /// Gap between the OS end and the WinRE start, zero unless WinRE follows the OS
    pub unallocated_between: u64,
    /// WinRE follows the OS and is numbered OS + 1
    pub adjacency_valid: bool,
    pub os_partition_number: u32,
    pub os_offset: u64,
    pub os_size: u64,
    pub winre_partition_number: u32,
    pub winre_offset: u64,
    pub winre_size_bytes: u64,
}

pub fn classify(disk: &Disk, os: &Partition, winre: &Partition) -> Layout {
    let same_disk = os.disk_number == winre.disk_number && os.disk_number == disk.number;
    let is_same_partition = os.is_same(winre);
    let winre_precedes_os = same_disk && !is_same_partition && winre.offset < os.offset;
    let follows = same_disk && !is_same_partition && winre.offset >= os.end();

    let unallocated_between = if follows {
        winre.offset - os.end()
    } else {
        0
    };
    let adjacency_valid = follows && os.number.checked_add(1) == Some(winre.number);

    Layout {
        disk_style: disk.partition_table.clone(),
        disk_number: disk.number,
        same_disk,
        is_same_partition,
        winre_is_system_or_active: winre.is_system_or_active,
        winre_precedes_os,
        unallocated_between,
        adjacency_valid,
        os_partition_number: os.number,
        os_offset: os.offset,
        os_size: os.size_bytes,
        winre_partition_number: winre.number,
        winre_offset: winre.offset,
        winre_size_bytes: winre.size_bytes,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::winre::types::MIB;

    pub(crate) fn disk(table: PartitionTableType) -> Disk {
        Disk {
            number: 0,
            partition_table: table,
            size_bytes: 500 * 1024 * MIB,
            guid: None,
        }
    }

    pub(crate) fn partition(number: u32, offset_mib: u64, size_mib: u64) -> Partition {
        Partition {
            disk_number: 0,
            number,
            offset: offset_mib * MIB,
            size_bytes: size_mib * MIB,
            is_system_or_active: false,
            drive_letter: None,
            access_paths: Vec::new(),
        }
    }

    #[test]
    fn test_adjacent_follow() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        assert!(layout.same_disk);
        assert!(!layout.winre_precedes_os);
        assert!(layout.adjacency_valid);
        assert_eq!(layout.unallocated_between, 0);
    }

    #[test]
    fn test_gap_is_measured() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_300, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        assert_eq!(layout.unallocated_between, 300 * MIB);
        assert!(layout.adjacency_valid);
    }

    #[test]
    fn test_non_adjacent_numbering_is_invalid() {
        let os = partition(3, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        assert!(!layout.adjacency_valid);
    }

    #[test]
    fn test_precedes() {
        let winre = partition(2, 16, 500);
        let os = partition(3, 516, 99_000);
        let layout = classify(&disk(PartitionTableType::MBR), &os, &winre);
        assert!(layout.winre_precedes_os);
        assert!(!layout.adjacency_valid);
        assert_eq!(layout.unallocated_between, 0);
    }

    #[test]
    fn test_same_partition() {
        let os = partition(3, 16, 99_000);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &os.clone());
        assert!(layout.is_same_partition);
        assert!(!layout.winre_precedes_os);
        assert!(!layout.adjacency_valid);
    }

    #[test]
    fn test_other_disk() {
        let os = partition(3, 16, 99_000);
        let mut winre = partition(1, 1, 500);
        winre.disk_number = 1;
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        assert!(!layout.same_disk);
        assert!(!layout.winre_precedes_os);
        assert!(!layout.adjacency_valid);
    }
}
