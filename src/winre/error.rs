use std::path::PathBuf;
use thiserror::Error;

use super::types::format_size;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_NO_ACTION: i32 = 1;
pub const EXIT_GENERIC_ERROR: i32 = 2;
pub const EXIT_INSUFFICIENT_PRIVILEGE: i32 = 10;
pub const EXIT_VALIDATION_ERROR: i32 = 12;

fn human(bytes: &u64) -> String {
    format_size(*bytes)
}

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported disk partition style: {0}")]
    UnsupportedDiskStyle(String),

    #[error(
        "Target OS partition size {} is below the supported minimum {}",
        human(.target),
        human(.minimum)
    )]
    TargetTooSmall { target: u64, minimum: u64 },

    #[error("Unexpected partition layout: {0}")]
    UnexpectedLayout(String),

    #[error("Backup target {} is not empty", .0.display())]
    BackupTargetNotEmpty(PathBuf),

    #[error("Backup failed at {}: {reason}", path.display())]
    BackupFailed { path: PathBuf, reason: String },

    #[error("This operation requires administrator privileges")]
    InsufficientPrivilege,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{tool} failed with exit code {code}: {detail}")]
    ToolFailed {
        tool: String,
        code: i32,
        detail: String,
    },

    #[error("Could not interpret {tool} output: {detail}")]
    UnparseableOutput { tool: String, detail: String },

    #[error("Timed out waiting for {0}")]
    SettleTimeout(String),

    #[error("Failed to parse JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResizeError {
    pub fn tool_failed(tool: &str, code: i32, detail: impl Into<String>) -> Self {
        ResizeError::ToolFailed {
            tool: tool.to_string(),
            code,
            detail: detail.into(),
        }
    }

    pub fn unparseable(tool: &str, detail: impl Into<String>) -> Self {
        ResizeError::UnparseableOutput {
            tool: tool.to_string(),
            detail: detail.into(),
        }
    }

    /// Errors detected before anything on disk was touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ResizeError::UnsupportedDiskStyle(_)
                | ResizeError::TargetTooSmall { .. }
                | ResizeError::UnexpectedLayout(_)
                | ResizeError::BackupTargetNotEmpty(_)
                | ResizeError::InvalidInput(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ResizeError::InsufficientPrivilege => EXIT_INSUFFICIENT_PRIVILEGE,
            e if e.is_validation() => EXIT_VALIDATION_ERROR,
            _ => EXIT_GENERIC_ERROR,
        }
    }
}
