//! External tool invocation
//!
//! Everything that touches the machine goes through [`ToolRunner`], so the
//! planning and sequencing logic can be exercised against scripted output.

pub mod logging;
pub mod powershell;

#[cfg(test)]
pub mod fake;

use duct::cmd;

use crate::ui::prelude::*;
use crate::winre::error::ResizeError;

use self::logging::ToolCommandLogger;

/// Captured outcome of one external tool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalToolResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExternalToolResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Most useful text for an error message
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }

    /// Turn a non-zero exit code into `ToolFailed`
    pub fn check(self, tool: &str) -> Result<Self, ResizeError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ResizeError::tool_failed(tool, self.exit_code, self.detail()))
        }
    }
}

pub trait ToolRunner {
    /// Run a program to completion and capture its output. A non-zero exit
    /// code is not an error at this level.
    fn run(&self, program: &str, args: &[String]) -> Result<ExternalToolResult, ResizeError>;
}

/// Runs real processes
pub struct SystemRunner {
    logger: Option<ToolCommandLogger>,
}

impl SystemRunner {
    pub fn new() -> Self {
        let logger = match ToolCommandLogger::new() {
            Ok(logger) => Some(logger),
            Err(e) => {
                emit(
                    Level::Debug,
                    "winre.tool.logger",
                    &format!("Tool command log disabled: {e}"),
                    None,
                );
                None
            }
        };
        Self { logger }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ExternalToolResult, ResizeError> {
        emit(
            Level::Debug,
            "winre.tool.run",
            &format!("> {} {}", program, args.join(" ")),
            None,
        );

        let output = cmd(program, args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| ResizeError::tool_failed(program, -1, format!("failed to start: {e}")))?;

        let result = ExternalToolResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if let Some(logger) = &self.logger
            && let Err(e) = logger.log_command(program, args, &result)
        {
            emit(
                Level::Warn,
                "winre.tool.log_failed",
                &format!("Warning: Failed to log {program} command: {e}"),
                None,
            );
        }

        Ok(result)
    }
}

/// Fail early when a program the run depends on is not on PATH
pub fn require_tools(programs: &[&str]) -> Result<(), ResizeError> {
    for program in programs {
        which::which(program)
            .map_err(|e| ResizeError::NotFound(format!("{program} ({e})")))?;
    }
    Ok(())
}

pub fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
