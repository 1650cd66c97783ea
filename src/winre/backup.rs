//! Copy WinRE contents somewhere safe before the partition is deleted

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::error::ResizeError;
use super::events::RunResult;
use super::parsing::CmdletPartition;
use super::parsing::cmdlet::PARTITION_SELECT;
use super::tool::ToolRunner;
use super::tool::powershell::{query_one, run_script};
use super::types::Partition;
use crate::common::shell::ps_quote;

/// Volume metadata directory the OS keeps locked
pub const RESERVED_DIR: &str = "System Volume Information";

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BackupSummary {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// The destination must be absent or an empty directory
pub fn ensure_empty_target(dest_dir: &Path) -> Result<(), ResizeError> {
    if !dest_dir.exists() {
        return Ok(());
    }
    if !dest_dir.is_dir() {
        return Err(ResizeError::BackupTargetNotEmpty(dest_dir.to_path_buf()));
    }
    let mut entries = fs::read_dir(dest_dir).map_err(|e| ResizeError::BackupFailed {
        path: dest_dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    if entries.next().is_some() {
        return Err(ResizeError::BackupTargetNotEmpty(dest_dir.to_path_buf()));
    }
    Ok(())
}

fn is_reserved(entry: &walkdir::DirEntry) -> bool {
    entry.depth() == 1
        && entry
            .file_name()
            .to_string_lossy()
            .eq_ignore_ascii_case(RESERVED_DIR)
}

fn failed(path: &Path, reason: impl ToString) -> ResizeError {
    ResizeError::BackupFailed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Recursively copy `source_root` into `dest_dir`; the first failure aborts
pub fn backup(source_root: &Path, dest_dir: &Path) -> Result<BackupSummary, ResizeError> {
    ensure_empty_target(dest_dir)?;
    if !source_root.is_dir() {
        return Err(failed(source_root, "source is not a readable directory"));
    }
    fs::create_dir_all(dest_dir).map_err(|e| failed(dest_dir, e))?;

    let mut summary = BackupSummary::default();
    let walker = WalkDir::new(source_root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_reserved(e));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source_root).to_path_buf();
            failed(&path, e)
        })?;
        let relative = entry
            .path()
            .strip_prefix(source_root)
            .map_err(|e| failed(entry.path(), e))?;
        let destination = dest_dir.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|e| failed(&destination, e))?;
            summary.directories += 1;
        } else {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| failed(parent, e))?;
            }
            let bytes = fs::copy(entry.path(), &destination).map_err(|e| failed(entry.path(), e))?;
            summary.files += 1;
            summary.bytes += bytes;
        }
    }

    Ok(summary)
}

/// Cleanup for a letter that was assigned but never learned; failure only warns
fn drop_assigned_letter(runner: &dyn ToolRunner, partition: &Partition, result: &mut RunResult) {
    let script = format!(
        "$p = Get-Partition -DiskNumber {} -PartitionNumber {}; \
         if ($p.DriveLetter) {{ $p | Remove-PartitionAccessPath -AccessPath \"$($p.DriveLetter):\\\" }}",
        partition.disk_number, partition.number
    );
    if let Err(e) = run_script(runner, &script) {
        result.warning(
            "winre.backup.unmount_failed",
            format!(
                "Could not remove the temporary drive letter of {}: {e}",
                partition.label()
            ),
        );
    }
}

/// Readable root of a partition, with a drive letter assigned for the
/// duration of the backup when it has none
pub struct MountedPartition<'a> {
    runner: &'a dyn ToolRunner,
    partition: Partition,
    root: PathBuf,
    assigned: Option<String>,
}

impl std::fmt::Debug for MountedPartition<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedPartition")
            .field("partition", &self.partition)
            .field("root", &self.root)
            .field("assigned", &self.assigned)
            .finish_non_exhaustive()
    }
}

impl<'a> MountedPartition<'a> {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mount(
        runner: &'a dyn ToolRunner,
        partition: &Partition,
        result: &mut RunResult,
    ) -> Result<Self, ResizeError> {
        if let Some(letter) = partition.drive_letter {
            return Ok(Self {
                runner,
                partition: partition.clone(),
                root: PathBuf::from(format!("{letter}:\\")),
                assigned: None,
            });
        }

        run_script(
            runner,
            &format!(
                "Add-PartitionAccessPath -DiskNumber {} -PartitionNumber {} -AssignDriveLetter",
                partition.disk_number, partition.number
            ),
        )?;
        let refreshed = query_one::<CmdletPartition>(
            runner,
            &format!(
                "Get-Partition -DiskNumber {} -PartitionNumber {} | {PARTITION_SELECT}",
                partition.disk_number, partition.number
            ),
            &partition.label(),
        )
        .map(Partition::from);

        let refreshed = match refreshed {
            Ok(refreshed) => refreshed,
            Err(e) => {
                drop_assigned_letter(runner, partition, result);
                return Err(e);
            }
        };
        let Some(letter) = refreshed.drive_letter else {
            drop_assigned_letter(runner, partition, result);
            return Err(ResizeError::NotFound(format!(
                "drive letter for {}",
                partition.label()
            )));
        };
        let root = format!("{letter}:\\");
        result.status(
            "winre.backup.mounted",
            format!("Temporarily mounted {} at {root}", partition.label()),
        );

        Ok(Self {
            runner,
            partition: refreshed,
            root: PathBuf::from(&root),
            assigned: Some(root),
        })
    }

    /// Remove a temporary drive letter; failure only warns
    pub fn release(self, result: &mut RunResult) {
        let Some(access_path) = self.assigned else {
            return;
        };
        let script = format!(
            "Remove-PartitionAccessPath -DiskNumber {} -PartitionNumber {} -AccessPath {}",
            self.partition.disk_number,
            self.partition.number,
            ps_quote(&access_path)
        );
        match run_script(self.runner, &script) {
            Ok(_) => result.status(
                "winre.backup.unmounted",
                format!("Removed temporary access path {access_path}"),
            ),
            Err(e) => result.warning(
                "winre.backup.unmount_failed",
                format!("Could not remove temporary access path {access_path}: {e}"),
            ),
        }
    }
}
