use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;

/// Centralized path management for winre-resize

const APP_DIR: &str = "winre-resize";

/// Get the config directory, without creating it
pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join(APP_DIR))
}

/// Default location of the optional TOML config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the data directory
pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .context("Unable to determine local data directory")?
        .join(APP_DIR);

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory at {}", data_dir.display()))?;

    Ok(data_dir)
}

/// Get the external tool log directory
pub fn tool_logs_dir() -> Result<PathBuf> {
    let logs_dir = data_dir()?.join("logs");
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("creating logs directory at {}", logs_dir.display()))?;
    Ok(logs_dir)
}

/// Root of the system drive, e.g. `C:\`
pub fn system_drive_root() -> PathBuf {
    let drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
    PathBuf::from(format!("{}\\", drive.trim_end_matches('\\')))
}

/// Default metadata file of the recovery agent
pub fn default_reagent_xml() -> PathBuf {
    let windir = std::env::var("SystemRoot")
        .map(PathBuf::from)
        .unwrap_or_else(|_| system_drive_root().join("Windows"));
    windir.join("System32").join("Recovery").join("ReAgent.xml")
}

/// Timestamped backup directory used when none is configured
pub fn default_backup_dir(now: DateTime<Local>) -> PathBuf {
    system_drive_root().join(format!("WinRE_Backup_{}", now.format("%Y%m%d_%H%M%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_backup_dir_is_timestamped() {
        let now = Local.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
        let dir = default_backup_dir(now);
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, "WinRE_Backup_20260309_140507");
    }

    #[test]
    fn test_reagent_xml_file_name() {
        let path = default_reagent_xml();
        assert!(path.ends_with("ReAgent.xml"));
    }
}
