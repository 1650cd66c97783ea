//! Recovery agent control through `reagentc.exe`
//!
//! Disabling the agent moves the WinRE image back onto the OS volume, which is
//! what makes it safe to delete and recreate the recovery partition.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::ResizeError;
use super::events::RunResult;
use super::parsing::{
    WinreLocationRecord, parse_reagentc_info, parse_winre_location, replace_winre_location,
};
use super::tool::{ToolRunner, args};
use super::types::{ImageLocation, RecoveryAgentState};

pub const REAGENTC: &str = "reagentc.exe";

pub struct RecoveryAgent<'a> {
    runner: &'a dyn ToolRunner,
    metadata: PathBuf,
}

impl<'a> RecoveryAgent<'a> {
    pub fn new(runner: &'a dyn ToolRunner, metadata: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            metadata: metadata.into(),
        }
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata
    }

    /// Live `reagentc /info` query
    pub fn status(&self) -> Result<RecoveryAgentState, ResizeError> {
        let output = self
            .runner
            .run(REAGENTC, &args(["/info"]))?
            .check("reagentc")?;
        parse_reagentc_info(&output.stdout)
    }

    /// The `<WinreLocation>` record, `None` if the file or the element is missing
    pub fn read_metadata(&self) -> Result<Option<WinreLocationRecord>, ResizeError> {
        if !self.metadata.exists() {
            return Ok(None);
        }
        let xml = fs::read_to_string(&self.metadata)?;
        parse_winre_location(&xml)
    }

    /// Location persisted by the agent, usable while the agent is disabled
    pub fn persisted_location(&self) -> Result<Option<ImageLocation>, ResizeError> {
        Ok(self
            .read_metadata()?
            .and_then(|record| record.to_image_location()))
    }

    /// Runs `reagentc /disable` first and only then clears `<WinreLocation>`
    /// in ReAgent.xml, since reagentc rewrites that file while disabling.
    pub fn disable(&self, result: &mut RunResult) -> Result<(), ResizeError> {
        let state = self.status()?;
        if state.enabled {
            self.runner
                .run(REAGENTC, &args(["/disable"]))?
                .check("reagentc")?;
            result.success("winre.agent.disabled", "Disabled the recovery agent");
        } else {
            result.status(
                "winre.agent.already_disabled",
                "Recovery agent is already disabled",
            );
        }

        self.clear_metadata(result)
    }

    pub fn enable(&self, result: &mut RunResult) -> Result<(), ResizeError> {
        // A broken status query should not stop the enable attempt
        match self.status() {
            Ok(state) if state.enabled => {
                result.status(
                    "winre.agent.already_enabled",
                    "Recovery agent is already enabled",
                );
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => result.warning(
                "winre.agent.status_failed",
                format!("Could not query the recovery agent before enabling: {e}"),
            ),
        }

        self.runner
            .run(REAGENTC, &args(["/enable"]))?
            .check("reagentc")?;
        result.success("winre.agent.enabled", "Enabled the recovery agent");
        Ok(())
    }

    /// Reset `<WinreLocation>` to the empty sentinel unless it already is
    fn clear_metadata(&self, result: &mut RunResult) -> Result<(), ResizeError> {
        if !self.metadata.exists() {
            result.warning(
                "winre.agent.metadata_missing",
                format!("{} not found, nothing to clear", self.metadata.display()),
            );
            return Ok(());
        }

        let xml = fs::read_to_string(&self.metadata)?;
        match parse_winre_location(&xml)? {
            Some(record) if record.is_cleared() => {
                result.status(
                    "winre.agent.metadata_clear",
                    "WinRE location in ReAgent.xml is already cleared",
                );
                Ok(())
            }
            Some(_) => {
                let updated = replace_winre_location(&xml, &WinreLocationRecord::cleared())?;
                fs::write(&self.metadata, updated)?;
                result.success(
                    "winre.agent.metadata_cleared",
                    format!("Cleared WinRE location in {}", self.metadata.display()),
                );
                Ok(())
            }
            None => {
                result.warning(
                    "winre.agent.metadata_missing",
                    format!("{} has no WinreLocation element", self.metadata.display()),
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::winre::tool::ExternalToolResult;
    use crate::winre::tool::fake::ScriptedRunner;
    use tempfile::TempDir;

    const INFO_ENABLED: &str = "    Windows RE status:         Enabled\n    Windows RE location:       \\\\?\\GLOBALROOT\\device\\harddisk0\\partition4\\Recovery\\WindowsRE\n";
    const INFO_DISABLED: &str = "    Windows RE status:         Disabled\n    Windows RE location:\n";

    const XML: &str = "<?xml version='1.0' encoding='utf-8'?>\n<WindowsRE version=\"2.0\">\n  <WinreLocation path=\"\\Recovery\\WindowsRE\" id=\"0\" offset=\"255483936768\" guid=\"{6f1b2c0e-9d1a-4b8e-a3f5-2d4c6e8a0b1c}\"/>\n</WindowsRE>\n";

    fn metadata(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("ReAgent.xml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_disable_runs_tool_and_clears_metadata() {
        let dir = TempDir::new().unwrap();
        let path = metadata(&dir, XML);
        let runner = ScriptedRunner::new()
            .once("/info", ExternalToolResult::ok(INFO_ENABLED))
            .on("/disable", ExternalToolResult::ok("REAGENTC.EXE: Operation Successful."));
        let agent = RecoveryAgent::new(&runner, &path);
        let mut result = RunResult::quiet();

        agent.disable(&mut result).unwrap();

        assert_eq!(runner.count("/disable"), 1);
        let record = agent.read_metadata().unwrap().unwrap();
        assert!(record.is_cleared());
        assert!(result.has_code("winre.agent.metadata_cleared"));
    }

    #[test]
    fn test_disable_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cleared = replace_winre_location(XML, &WinreLocationRecord::cleared()).unwrap();
        let path = metadata(&dir, &cleared);
        let runner = ScriptedRunner::new().on("/info", ExternalToolResult::ok(INFO_DISABLED));
        let agent = RecoveryAgent::new(&runner, &path);
        let mut result = RunResult::quiet();

        agent.disable(&mut result).unwrap();

        assert_eq!(runner.count("/disable"), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), cleared);
        assert!(result.has_code("winre.agent.already_disabled"));
    }

    #[test]
    fn test_disable_failure_is_tool_failed() {
        let dir = TempDir::new().unwrap();
        let path = metadata(&dir, XML);
        let runner = ScriptedRunner::new()
            .on("/info", ExternalToolResult::ok(INFO_ENABLED))
            .on("/disable", ExternalToolResult::failed(2, "Access is denied."));
        let agent = RecoveryAgent::new(&runner, &path);

        let err = agent.disable(&mut RunResult::quiet()).unwrap_err();
        assert!(matches!(err, ResizeError::ToolFailed { code: 2, .. }));
        // Metadata untouched when the tool failed
        assert_eq!(fs::read_to_string(&path).unwrap(), XML);
    }

    #[test]
    fn test_enable_skips_when_enabled() {
        let runner = ScriptedRunner::new().on("/info", ExternalToolResult::ok(INFO_ENABLED));
        let agent = RecoveryAgent::new(&runner, "missing.xml");
        agent.enable(&mut RunResult::quiet()).unwrap();
        assert_eq!(runner.count("/enable"), 0);
    }

    #[test]
    fn test_enable_attempted_when_status_fails() {
        let runner = ScriptedRunner::new()
            .on("/info", ExternalToolResult::failed(1, "boom"))
            .on("/enable", ExternalToolResult::ok("REAGENTC.EXE: Operation Successful."));
        let agent = RecoveryAgent::new(&runner, "missing.xml");
        let mut result = RunResult::quiet();

        agent.enable(&mut result).unwrap();
        assert_eq!(runner.count("/enable"), 1);
        assert_eq!(result.warnings().count(), 1);
    }

    #[test]
    fn test_persisted_location() {
        let dir = TempDir::new().unwrap();
        let path = metadata(&dir, XML);
        let runner = ScriptedRunner::new();
        let agent = RecoveryAgent::new(&runner, &path);
        let location = agent.persisted_location().unwrap().unwrap();
        assert_eq!(location.offset, Some(255483936768));
    }
}
