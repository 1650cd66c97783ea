//! Resize planning
//!
//! [`plan`] is pure: it only looks at a [`Layout`] and a few sizes, so every
//! rule here is covered by unit tests without touching a disk.

use serde::Serialize;

use super::error::ResizeError;
use super::layout::Layout;
use super::types::{DiskStyle, MIB, PartitionSizeInfo, format_size, round_up_mib};

/// Immutable description of the partition changes for one run
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResizePlan {
    pub disk_style: DiskStyle,
    pub disk_number: u32,
    pub os_partition_number: u32,
    pub winre_partition_number: u32,
    pub winre_partition_offset: u64,

    pub needs_shrink_os: bool,
    /// Bytes taken from the end of the OS partition, a whole number of MiB
    pub shrink_amount: u64,
    /// WinRE sits before the OS and has to be recreated after it
    pub needs_create_new_winre_partition: bool,
    pub delete_old_winre: bool,
    pub needs_backup: bool,

    pub current_os_partition_size: u64,
    pub target_os_partition_size: u64,
    pub target_winre_partition_size: u64,

    pub reuse_unallocated_space: bool,
    /// Free bytes between OS and WinRE absorbed by the new partition
    pub unallocated_used: u64,

    pub os_partition_offset: u64,
    /// Where the new WinRE partition starts
    pub new_partition_offset: u64,
    /// Expected number of the new WinRE partition, only used for reporting
    pub predicted_partition_number: u32,
}

impl ResizePlan {
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Disk {} ({}): OS partition {}, WinRE partition {}",
            self.disk_number, self.disk_style, self.os_partition_number, self.winre_partition_number
        )];
        if self.needs_shrink_os {
            lines.push(format!(
                "Shrink OS partition by {} ({} -> {})",
                format_size(self.shrink_amount),
                format_size(self.current_os_partition_size),
                format_size(self.target_os_partition_size)
            ));
        }
        if self.reuse_unallocated_space {
            lines.push(format!(
                "Reuse {} of unallocated space",
                format_size(self.unallocated_used)
            ));
        }
        if self.delete_old_winre {
            lines.push(format!(
                "Delete WinRE partition {}",
                self.winre_partition_number
            ));
        } else {
            lines.push(format!(
                "Keep system/active partition {}",
                self.winre_partition_number
            ));
        }
        lines.push(format!(
            "Create {} recovery partition at offset {}",
            format_size(self.target_winre_partition_size),
            self.new_partition_offset
        ));
        if self.needs_backup {
            lines.push("Back up WinRE contents first".to_string());
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum PlanOutcome {
    /// WinRE already has enough free space
    NoActionNeeded { free_space: u64 },
    /// WinRE is hosted on the OS partition, there is nothing to grow
    WinReOnOsPartition,
    Resize(ResizePlan),
}

pub fn plan(
    layout: &Layout,
    winre_size: &PartitionSizeInfo,
    increment: u64,
    os_min_size: u64,
) -> Result<PlanOutcome, ResizeError> {
    if increment == 0 || increment % MIB != 0 {
        return Err(ResizeError::InvalidInput(format!(
            "increment {increment} is not a positive multiple of 1 MiB"
        )));
    }

    if layout.is_same_partition {
        return Ok(PlanOutcome::WinReOnOsPartition);
    }

    if winre_size.free_space >= increment {
        return Ok(PlanOutcome::NoActionNeeded {
            free_space: winre_size.free_space,
        });
    }

    let disk_style = DiskStyle::try_from(&layout.disk_style)?;

    if !layout.same_disk {
        return Err(ResizeError::UnexpectedLayout(
            "WinRE partition is not on the OS disk".to_string(),
        ));
    }

    let target_winre = round_up_mib(winre_size.capacity.saturating_add(increment));

    let resize = if layout.winre_precedes_os {
        let shrink_amount = target_winre;
        let target_os = checked_target(layout.os_size, shrink_amount, os_min_size)?;
        let os_partition_offset = layout.os_offset;

        ResizePlan {
            disk_style,
            disk_number: layout.disk_number,
            os_partition_number: layout.os_partition_number,
            winre_partition_number: layout.winre_partition_number,
            winre_partition_offset: layout.winre_offset,
            needs_shrink_os: true,
            shrink_amount,
            needs_create_new_winre_partition: true,
            delete_old_winre: !layout.winre_is_system_or_active,
            needs_backup: !layout.winre_is_system_or_active,
            current_os_partition_size: layout.os_size,
            target_os_partition_size: target_os,
            target_winre_partition_size: target_winre,
            reuse_unallocated_space: false,
            unallocated_used: 0,
            os_partition_offset,
            new_partition_offset: os_partition_offset + target_os,
            predicted_partition_number: layout.os_partition_number + 1,
        }
    } else {
        if !layout.adjacency_valid {
            return Err(ResizeError::UnexpectedLayout(format!(
                "WinRE partition {} does not directly follow OS partition {}",
                layout.winre_partition_number, layout.os_partition_number
            )));
        }
        if layout.winre_is_system_or_active {
            return Err(ResizeError::UnexpectedLayout(format!(
                "WinRE partition {} follows the OS but is the system/active partition",
                layout.winre_partition_number
            )));
        }

        let gap = layout.unallocated_between;
        let (reuse, shrink_amount) = if gap >= increment {
            (true, 0)
        } else {
            let missing = increment - gap;
            (false, (missing.div_ceil(MIB) * MIB).min(increment))
        };
        let target_os = if shrink_amount > 0 {
            checked_target(layout.os_size, shrink_amount, os_min_size)?
        } else {
            layout.os_size
        };

        ResizePlan {
            disk_style,
            disk_number: layout.disk_number,
            os_partition_number: layout.os_partition_number,
            winre_partition_number: layout.winre_partition_number,
            winre_partition_offset: layout.winre_offset,
            needs_shrink_os: shrink_amount > 0,
            shrink_amount,
            needs_create_new_winre_partition: false,
            delete_old_winre: true,
            needs_backup: true,
            current_os_partition_size: layout.os_size,
            target_os_partition_size: target_os,
            target_winre_partition_size: target_winre,
            reuse_unallocated_space: reuse,
            unallocated_used: gap,
            os_partition_offset: layout.os_offset,
            new_partition_offset: layout.os_offset + target_os,
            predicted_partition_number: layout.winre_partition_number,
        }
    };

    Ok(PlanOutcome::Resize(resize))
}

fn checked_target(os_size: u64, shrink: u64, os_min_size: u64) -> Result<u64, ResizeError> {
    let target = os_size.saturating_sub(shrink);
    if os_size < shrink || target < os_min_size {
        return Err(ResizeError::TargetTooSmall {
            target,
            minimum: os_min_size,
        });
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::winre::layout::classify;
    use crate::winre::layout::tests::{disk, partition};
    use crate::winre::types::{PartitionTableType, WINRE_INCREMENT};

    const OS_MIN: u64 = 40_000 * MIB;

    fn size(capacity_mib: u64, free_mib: u64) -> PartitionSizeInfo {
        PartitionSizeInfo {
            capacity: capacity_mib * MIB,
            free_space: free_mib * MIB,
        }
    }

    fn resize(outcome: PlanOutcome) -> ResizePlan {
        match outcome {
            PlanOutcome::Resize(plan) => plan,
            other => panic!("expected a resize plan, got {other:?}"),
        }
    }

    #[test]
    fn test_scenario_a_shrink_adjacent() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        let plan = resize(plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap());

        assert!(plan.needs_shrink_os);
        assert_eq!(plan.shrink_amount, 250 * MIB);
        assert_eq!(plan.target_winre_partition_size, 750 * MIB);
        assert_eq!(plan.target_os_partition_size, 99_734 * MIB);
        assert_eq!(plan.new_partition_offset, 99_750 * MIB);
        assert!(!plan.reuse_unallocated_space);
        assert!(plan.needs_backup);
        assert!(plan.delete_old_winre);
        assert!(!plan.needs_create_new_winre_partition);
        assert_eq!(plan.predicted_partition_number, 5);
    }

    #[test]
    fn test_scenario_b_reuse_gap() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_300, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        let plan = resize(plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap());

        assert!(plan.reuse_unallocated_space);
        assert!(!plan.needs_shrink_os);
        assert_eq!(plan.shrink_amount, 0);
        assert_eq!(plan.unallocated_used, 300 * MIB);
        assert_eq!(plan.target_os_partition_size, 99_984 * MIB);
        assert_eq!(plan.new_partition_offset, 100_000 * MIB);
    }

    #[test]
    fn test_scenario_c_enough_free_space() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        let outcome = plan(&layout, &size(500, 260), WINRE_INCREMENT, OS_MIN).unwrap();
        assert_eq!(
            outcome,
            PlanOutcome::NoActionNeeded {
                free_space: 260 * MIB
            }
        );
    }

    #[test]
    fn test_scenario_d_winre_precedes_os() {
        let winre = partition(2, 16, 500);
        let os = partition(3, 516, 99_000);
        let layout = classify(&disk(PartitionTableType::MBR), &os, &winre);
        let plan = resize(plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap());

        assert!(plan.needs_create_new_winre_partition);
        assert_eq!(plan.disk_style, DiskStyle::Mbr);
        assert_eq!(plan.shrink_amount, 750 * MIB);
        assert_eq!(plan.target_os_partition_size, 98_250 * MIB);
        assert!(plan.needs_backup);
        assert!(plan.delete_old_winre);
        assert_eq!(plan.predicted_partition_number, 4);
    }

    #[test]
    fn test_precedes_system_partition_is_kept() {
        let mut winre = partition(1, 1, 500);
        winre.is_system_or_active = true;
        let os = partition(2, 501, 99_000);
        let layout = classify(&disk(PartitionTableType::MBR), &os, &winre);
        let plan = resize(plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap());

        assert!(!plan.needs_backup);
        assert!(!plan.delete_old_winre);
    }

    #[test]
    fn test_partial_gap_rounds_to_mib() {
        let os = partition(4, 16, 99_984);
        let mut winre = partition(5, 100_000, 500);
        winre.offset += 100 * MIB + 512 * 1024;
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        let plan = resize(plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap());

        // 149.5 MiB missing rounds up to 150 MiB
        assert_eq!(plan.shrink_amount, 150 * MIB);
        assert!(!plan.reuse_unallocated_space);
    }

    #[test]
    fn test_target_too_small() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        let err = plan(&layout, &size(500, 5), WINRE_INCREMENT, 99_800 * MIB).unwrap_err();
        assert!(matches!(err, ResizeError::TargetTooSmall { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_unsupported_disk_style() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::RAW), &os, &winre);
        let err = plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap_err();
        assert!(matches!(err, ResizeError::UnsupportedDiskStyle(_)));
    }

    #[test]
    fn test_non_adjacent_is_unexpected() {
        let os = partition(3, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        let err = plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap_err();
        assert!(matches!(err, ResizeError::UnexpectedLayout(_)));
    }

    #[test]
    fn test_following_system_partition_is_unexpected() {
        let os = partition(4, 16, 99_984);
        let mut winre = partition(5, 100_000, 500);
        winre.is_system_or_active = true;
        let layout = classify(&disk(PartitionTableType::MBR), &os, &winre);
        let err = plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap_err();
        assert!(matches!(err, ResizeError::UnexpectedLayout(_)));
    }

    #[test]
    fn test_other_disk_is_unexpected() {
        let os = partition(4, 16, 99_984);
        let mut winre = partition(1, 1, 500);
        winre.disk_number = 1;
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        let err = plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap_err();
        assert!(matches!(err, ResizeError::UnexpectedLayout(_)));
    }

    #[test]
    fn test_same_partition_is_terminal() {
        let os = partition(3, 16, 99_984);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &os.clone());
        let outcome = plan(&layout, &size(99_984, 1), WINRE_INCREMENT, OS_MIN).unwrap();
        assert_eq!(outcome, PlanOutcome::WinReOnOsPartition);
    }

    #[test]
    fn test_invalid_increment() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        for increment in [0, MIB + 1] {
            let err = plan(&layout, &size(500, 5), increment, OS_MIN).unwrap_err();
            assert!(matches!(err, ResizeError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_second_run_is_no_action() {
        let os = partition(4, 16, 99_984);
        let winre = partition(5, 100_000, 500);
        let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
        let first = resize(plan(&layout, &size(500, 5), WINRE_INCREMENT, OS_MIN).unwrap());

        // Geometry after the mutator ran: shrunk OS, bigger WinRE with the increment free
        let os_after = partition(4, 16, first.target_os_partition_size / MIB);
        let winre_after = partition(
            first.predicted_partition_number,
            first.new_partition_offset / MIB,
            first.target_winre_partition_size / MIB,
        );
        let layout_after = classify(&disk(PartitionTableType::GPT), &os_after, &winre_after);
        let after_size = PartitionSizeInfo {
            capacity: first.target_winre_partition_size,
            free_space: first.target_winre_partition_size - 495 * MIB,
        };
        let second = plan(&layout_after, &after_size, WINRE_INCREMENT, OS_MIN).unwrap();
        assert!(matches!(second, PlanOutcome::NoActionNeeded { .. }));
    }

    #[test]
    fn test_large_gap_never_shrinks() {
        for gap_mib in [250, 251, 300, 1024, 10_000] {
            for free_mib in [0, 5, 100, 249] {
                let os = partition(4, 16, 99_984);
                let winre = partition(5, 100_000 + gap_mib, 500);
                let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);
                let plan =
                    resize(plan(&layout, &size(500, free_mib), WINRE_INCREMENT, OS_MIN).unwrap());
                assert!(!plan.needs_shrink_os, "gap {gap_mib} MiB");
                assert!(plan.reuse_unallocated_space);
                assert_eq!(plan.target_os_partition_size, plan.current_os_partition_size);
            }
        }
    }

    #[test]
    fn test_shrink_is_whole_mib_and_respects_minimum() {
        for gap_kib in [0u64, 1, 1023, 1024, 50_000, 150_001, 255_999] {
            for os_min_mib in [1_000u64, 99_700, 99_740, 99_983] {
                let os = partition(4, 16, 99_984);
                let mut winre = partition(5, 100_000, 500);
                winre.offset += gap_kib * 1024;
                let layout = classify(&disk(PartitionTableType::GPT), &os, &winre);

                match plan(&layout, &size(500, 5), WINRE_INCREMENT, os_min_mib * MIB) {
                    Ok(PlanOutcome::Resize(plan)) => {
                        assert!(plan.shrink_amount > 0);
                        assert_eq!(plan.shrink_amount % MIB, 0);
                        assert!(plan.shrink_amount <= WINRE_INCREMENT);
                        assert!(plan.target_os_partition_size >= os_min_mib * MIB);
                        assert!(plan.target_winre_partition_size >= 750 * MIB);
                    }
                    Err(ResizeError::TargetTooSmall { target, minimum }) => {
                        assert!(target < minimum);
                    }
                    other => panic!("unexpected outcome {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_precedes_always_creates_new_partition() {
        for system in [false, true] {
            for style in [PartitionTableType::GPT, PartitionTableType::MBR] {
                let mut winre = partition(1, 1, 500);
                winre.is_system_or_active = system;
                let os = partition(2, 501, 99_000);
                let layout = classify(&disk(style), &os, &winre);
                let plan = resize(plan(&layout, &size(480, 20), WINRE_INCREMENT, OS_MIN).unwrap());
                assert!(plan.needs_create_new_winre_partition);
                assert_eq!(plan.needs_backup, !system);
                assert_eq!(plan.shrink_amount % MIB, 0);
            }
        }
    }
}
