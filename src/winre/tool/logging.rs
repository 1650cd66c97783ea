use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use crate::common::paths;

use super::ExternalToolResult;

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolCommandLog {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub args: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

/// Appends every external tool run to a JSONL file while debug output is on
#[derive(Debug, Clone)]
pub struct ToolCommandLogger {
    log_dir: PathBuf,
}

impl ToolCommandLogger {
    pub fn new() -> Result<Self> {
        // Only touch the filesystem if debug is enabled
        if !crate::ui::is_debug_enabled() {
            return Ok(Self {
                log_dir: PathBuf::new(),
            });
        }
        Ok(Self {
            log_dir: paths::tool_logs_dir()?,
        })
    }

    pub fn with_dir(log_dir: PathBuf) -> Result<Self> {
        create_dir_all(&log_dir).context("Failed to create tool log directory")?;
        Ok(Self { log_dir })
    }

    pub fn log_command(
        &self,
        command: &str,
        args: &[String],
        result: &ExternalToolResult,
    ) -> Result<()> {
        if self.log_dir.as_os_str().is_empty() {
            return Ok(());
        }

        let log_entry = ToolCommandLog {
            timestamp: Utc::now(),
            command: command.to_string(),
            args: args.to_vec(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            exit_code: result.exit_code,
            success: result.success(),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file_path())
            .context("Failed to open tool log file")?;

        let json_line =
            serde_json::to_string(&log_entry).context("Failed to serialize tool command log")?;

        writeln!(file, "{json_line}").context("Failed to write to tool log file")?;

        Ok(())
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir.join("tool_commands.jsonl")
    }
}
