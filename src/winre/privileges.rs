use super::error::ResizeError;
use super::tool::ToolRunner;
use super::tool::powershell::run_script;

const IS_ADMIN_SCRIPT: &str = "([Security.Principal.WindowsPrincipal][Security.Principal.WindowsIdentity]::GetCurrent()).IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)";

/// Partition changes and reagentc both need an elevated token
pub fn check_privilege_requirements(runner: &dyn ToolRunner) -> Result<(), ResizeError> {
    let output = run_script(runner, IS_ADMIN_SCRIPT)?;
    if output.stdout.trim().eq_ignore_ascii_case("true") {
        Ok(())
    } else {
        Err(ResizeError::InsufficientPrivilege)
    }
}
