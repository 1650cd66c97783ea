//! Storage cmdlets through `powershell.exe`

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::winre::error::ResizeError;

use super::{ExternalToolResult, ToolRunner};

pub const POWERSHELL: &str = "powershell.exe";

/// `ConvertTo-Json` emits a bare object for a single result
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Run a script; a terminating error or non-zero exit becomes `ToolFailed`
pub fn run_script(runner: &dyn ToolRunner, script: &str) -> Result<ExternalToolResult, ResizeError> {
    let script = format!("$ErrorActionPreference = 'Stop'; {script}");
    let args = vec![
        "-NoProfile".to_string(),
        "-NonInteractive".to_string(),
        "-ExecutionPolicy".to_string(),
        "Bypass".to_string(),
        "-Command".to_string(),
        script,
    ];
    runner.run(POWERSHELL, &args)?.check("powershell")
}

/// Run a pipeline and deserialize every object it yields
pub fn query_json<T: DeserializeOwned>(
    runner: &dyn ToolRunner,
    pipeline: &str,
) -> Result<Vec<T>, ResizeError> {
    let script = format!("ConvertTo-Json -InputObject @({pipeline}) -Depth 4 -Compress");
    let result = run_script(runner, &script)?;
    parse_json_list(&result.stdout)
}

pub fn parse_json_list<T: DeserializeOwned>(stdout: &str) -> Result<Vec<T>, ResizeError> {
    let trimmed = stdout.trim().trim_start_matches('\u{feff}');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<OneOrMany<T>>(trimmed)? {
        OneOrMany::Many(items) => Ok(items),
        OneOrMany::One(item) => Ok(vec![item]),
    }
}

/// Like [`query_json`] but exactly one object is expected
pub fn query_one<T: DeserializeOwned>(
    runner: &dyn ToolRunner,
    pipeline: &str,
    what: &str,
) -> Result<T, ResizeError> {
    query_json(runner, pipeline)?
        .into_iter()
        .next()
        .ok_or_else(|| ResizeError::NotFound(what.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::winre::tool::fake::ScriptedRunner;

    #[derive(Debug, Deserialize)]
    struct Item {
        #[serde(rename = "Number")]
        number: u32,
    }

    #[test]
    fn test_parse_json_list_shapes() {
        let many: Vec<Item> = parse_json_list(r#"[{"Number":0},{"Number":1}]"#).unwrap();
        assert_eq!(many.len(), 2);

        let one: Vec<Item> = parse_json_list(r#"{"Number":3}"#).unwrap();
        assert_eq!(one[0].number, 3);

        let none: Vec<Item> = parse_json_list("  \r\n").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_query_one_missing_is_not_found() {
        let runner = ScriptedRunner::new().on("Get-Disk", ExternalToolResult::ok("[]"));
        let err = query_one::<Item>(&runner, "Get-Disk -Number 9", "disk 9").unwrap_err();
        assert!(matches!(err, ResizeError::NotFound(_)));
    }

    #[test]
    fn test_run_script_failure_is_tool_failed() {
        let runner = ScriptedRunner::new().on(
            "Resize-Partition",
            ExternalToolResult::failed(1, "Size Not Supported"),
        );
        let err = run_script(&runner, "Resize-Partition -DiskNumber 0").unwrap_err();
        assert!(matches!(err, ResizeError::ToolFailed { code: 1, .. }));
    }
}
