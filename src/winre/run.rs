//! End-to-end resize procedure
//!
//! inspect -> classify -> plan -> backup -> disable agent -> mutate ->
//! enable agent -> verify. Validation problems surface before the first
//! change. Once the agent has been disabled it is always re-enabled, whatever
//! happened in between.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;

use super::agent::RecoveryAgent;
use super::backup::{BackupSummary, MountedPartition, backup, ensure_empty_target};
use super::error::{EXIT_NO_ACTION, EXIT_SUCCESS, ResizeError};
use super::events::{EventKind, RunResult};
use super::inspect::Inspector;
use super::layout::classify;
use super::mutate::{PartitionHandle, PartitionMutator, SettlePolicy};
use super::plan::{PlanOutcome, ResizePlan, plan};
use super::tool::ToolRunner;
use super::types::{Partition, WINRE_INCREMENT, format_size};
use super::verification::ResizeVerifier;

pub const SHUTDOWN: &str = "shutdown.exe";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub os_drive: char,
    pub backup_dir: PathBuf,
    pub force_reboot: bool,
    pub reboot_delay_secs: u32,
    /// Stop after planning
    pub dry_run: bool,
    pub reagent_xml: PathBuf,
    pub settle: SettlePolicy,
    pub increment: u64,
}

impl RunOptions {
    pub fn new(os_drive: char, backup_dir: PathBuf, reagent_xml: PathBuf) -> Self {
        Self {
            os_drive,
            backup_dir,
            force_reboot: false,
            reboot_delay_secs: 60,
            dry_run: false,
            reagent_xml,
            settle: SettlePolicy::default(),
            increment: WINRE_INCREMENT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum RunOutcome {
    Resized {
        plan: ResizePlan,
        partition: PartitionHandle,
        backup: Option<BackupSummary>,
    },
    NoActionNeeded {
        free_space: u64,
    },
    WinReOnOsPartition,
    /// Dry run: the plan that would have been executed
    Planned(ResizePlan),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Resized { .. } | RunOutcome::Planned(_) => EXIT_SUCCESS,
            RunOutcome::NoActionNeeded { .. } | RunOutcome::WinReOnOsPartition => EXIT_NO_ACTION,
        }
    }
}

pub fn run(
    runner: &dyn ToolRunner,
    options: &RunOptions,
    result: &mut RunResult,
) -> Result<RunOutcome, ResizeError> {
    result.config(
        "winre.config",
        format!(
            "OS drive {}:, backup to {}, increment {}",
            options.os_drive,
            options.backup_dir.display(),
            format_size(options.increment)
        ),
    );

    let agent = RecoveryAgent::new(runner, &options.reagent_xml);
    let inspector = Inspector::new(runner, &agent);
    let snapshot = inspector.inspect(options.os_drive, result)?;

    let layout = classify(&snapshot.disk, &snapshot.os, &snapshot.winre);
    let plan = match plan(
        &layout,
        &snapshot.winre_size,
        options.increment,
        snapshot.os_min_size,
    )? {
        PlanOutcome::NoActionNeeded { free_space } => {
            result.success(
                "winre.plan.no_action",
                format!(
                    "WinRE already has {} free, nothing to do",
                    format_size(free_space)
                ),
            );
            return Ok(RunOutcome::NoActionNeeded { free_space });
        }
        PlanOutcome::WinReOnOsPartition => {
            result.status(
                "winre.plan.shared",
                "WinRE lives on the OS partition, there is no recovery partition to grow",
            );
            return Ok(RunOutcome::WinReOnOsPartition);
        }
        PlanOutcome::Resize(plan) => plan,
    };
    result.record(
        EventKind::Status,
        "winre.plan",
        plan.summary(),
        Some(json!(plan)),
    );

    if plan.needs_backup {
        ensure_empty_target(&options.backup_dir)?;
    }

    if options.dry_run {
        result.status("winre.dry_run", "Dry run, no changes made");
        return Ok(RunOutcome::Planned(plan));
    }

    let backup = if plan.needs_backup {
        Some(backup_winre(
            runner,
            &snapshot.winre,
            &options.backup_dir,
            result,
        )?)
    } else {
        None
    };

    if let Err(e) = agent.disable(result) {
        result.failed(
            "winre.agent.disable_failed",
            format!("Could not disable the recovery agent: {e}"),
        );
        restore_agent(&agent, result);
        return Err(e);
    }

    let mutation = PartitionMutator::new(runner, options.settle).execute(&plan, result);
    restore_agent(&agent, result);

    let partition = match mutation {
        Ok(handle) => handle,
        Err(e) => {
            result.failed(
                "winre.mutate.failed",
                format!("Partition change failed: {e}"),
            );
            return Err(e);
        }
    };

    let verifier = ResizeVerifier::new(&inspector, &agent, options.increment);
    if let Err(e) = verifier.check(&plan, &partition, result) {
        result.warning(
            "winre.verify.failed",
            format!("Could not verify the final layout: {e}"),
        );
    }

    result.success(
        "winre.done",
        format!(
            "WinRE partition resized to {}",
            format_size(plan.target_winre_partition_size)
        ),
    );

    if options.force_reboot {
        schedule_reboot(runner, options.reboot_delay_secs, result);
    }

    Ok(RunOutcome::Resized {
        plan,
        partition,
        backup,
    })
}

fn backup_winre(
    runner: &dyn ToolRunner,
    winre: &Partition,
    dest: &Path,
    result: &mut RunResult,
) -> Result<BackupSummary, ResizeError> {
    let mounted = MountedPartition::mount(runner, winre, result)?;
    let outcome = backup(mounted.root(), dest);
    mounted.release(result);

    let summary = outcome?;
    result.record(
        EventKind::Success,
        "winre.backup.done",
        format!(
            "Backed up {} files ({}) to {}",
            summary.files,
            format_size(summary.bytes),
            dest.display()
        ),
        Some(json!(summary)),
    );
    Ok(summary)
}

/// A failed re-enable leaves recovery degraded, not the resize undone
fn restore_agent(agent: &RecoveryAgent, result: &mut RunResult) {
    if let Err(e) = agent.enable(result) {
        result.warning(
            "winre.agent.enable_failed",
            format!("Could not re-enable the recovery agent, run 'reagentc /enable' manually: {e}"),
        );
    }
}

fn schedule_reboot(runner: &dyn ToolRunner, delay_secs: u32, result: &mut RunResult) {
    let args = vec![
        "/r".to_string(),
        "/t".to_string(),
        delay_secs.to_string(),
        "/c".to_string(),
        "WinRE partition resized, restarting".to_string(),
    ];
    match runner
        .run(SHUTDOWN, &args)
        .and_then(|output| output.check("shutdown"))
    {
        Ok(_) => result.status(
            "winre.reboot",
            format!("Restart scheduled in {delay_secs} seconds"),
        ),
        Err(e) => result.warning("winre.reboot_failed", format!("Could not schedule a restart: {e}")),
    }
}
