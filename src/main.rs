mod common;
mod ui;
mod winre;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;

use crate::common::config::ResizeConfig;
use crate::common::paths;
use crate::ui::prelude::*;
use crate::winre::agent::REAGENTC;
use crate::winre::error::EXIT_GENERIC_ERROR;
use crate::winre::tool::powershell::POWERSHELL;
use crate::winre::tool::require_tools;
use crate::winre::{
    ResizeError, RunOptions, RunResult, SettlePolicy, SystemRunner, check_privilege_requirements,
};

/// Grow the Windows Recovery Environment partition so WinRE updates fit
#[derive(Parser, Debug)]
#[command(name = "winre-resize", author, version, about, long_about = None)]
struct Cli {
    /// Drive letter of the Windows installation
    #[arg(long, default_value = "C", value_name = "LETTER")]
    os_drive: String,

    /// Where to copy the WinRE partition contents before it is replaced
    /// (defaults to a timestamped folder on the system drive)
    #[arg(long, value_name = "PATH")]
    backup_dir: Option<PathBuf>,

    /// Restart the machine after a successful resize
    #[arg(long)]
    force_reboot: bool,

    /// Inspect and plan only, change nothing
    #[arg(long)]
    dry_run: bool,

    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Activate debug mode
    #[arg(short, long)]
    debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

/// Accepts `C`, `c:` and `C:\`
fn parse_drive_letter(raw: &str) -> Result<char, ResizeError> {
    let trimmed = raw.trim().trim_end_matches('\\').trim_end_matches(':');
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(ResizeError::InvalidInput(format!(
            "'{raw}' is not a drive letter"
        ))),
    }
}

fn execute(cli: &Cli) -> Result<i32> {
    let os_drive = parse_drive_letter(&cli.os_drive)?;
    let config = ResizeConfig::load(cli.config.as_deref())?;

    require_tools(&[POWERSHELL, REAGENTC])?;
    let runner = SystemRunner::new();
    if !cli.dry_run {
        check_privilege_requirements(&runner)?;
    }

    let backup_dir = cli
        .backup_dir
        .clone()
        .or_else(|| config.backup_dir.clone())
        .unwrap_or_else(|| paths::default_backup_dir(Local::now()));
    let reagent_xml = config
        .reagent_xml
        .clone()
        .unwrap_or_else(paths::default_reagent_xml);

    let mut options = RunOptions::new(os_drive, backup_dir, reagent_xml);
    options.force_reboot = cli.force_reboot || config.force_reboot;
    options.reboot_delay_secs = config.reboot_delay_secs;
    options.dry_run = cli.dry_run;
    options.settle = SettlePolicy {
        timeout: config.settle_timeout(),
        interval: config.settle_interval(),
    };

    let mut result = RunResult::new();
    let outcome = winre::run(&runner, &options, &mut result)?;

    let warnings = result.warnings().count();
    if warnings > 0 {
        separator();
        emit(
            Level::Warn,
            "winre.summary.warnings",
            &format!("Completed with {warnings} warning(s)"),
            None,
        );
    }
    Ok(outcome.exit_code())
}

fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color);
    ui::set_debug_mode(cli.debug);

    let code = match execute(&cli) {
        Ok(code) => code,
        Err(e) => {
            emit(Level::Error, "winre.error", &format!("Error: {e:#}"), None);
            e.downcast_ref::<ResizeError>()
                .map(ResizeError::exit_code)
                .unwrap_or(EXIT_GENERIC_ERROR)
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drive_letter() {
        assert_eq!(parse_drive_letter("C").unwrap(), 'C');
        assert_eq!(parse_drive_letter("d:").unwrap(), 'D');
        assert_eq!(parse_drive_letter("E:\\").unwrap(), 'E');
        assert!(parse_drive_letter("??").is_err());
        assert!(parse_drive_letter("").is_err());
        assert!(parse_drive_letter("CD").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["winre-resize"]);
        assert_eq!(cli.os_drive, "C");
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.dry_run);
    }
}
