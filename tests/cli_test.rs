use std::process::Command;

fn winre_resize() -> Command {
    Command::new(env!("CARGO_BIN_EXE_winre-resize"))
}

#[test]
fn help_exits_successfully() {
    let output = winre_resize().arg("--help").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--os-drive"));
    assert!(stdout.contains("--force-reboot"));
}

#[test]
fn invalid_drive_letter_is_a_validation_error() {
    let output = winre_resize()
        .args(["--dry-run", "--no-color", "--os-drive", "??"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(12));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a drive letter"));
}

#[test]
fn json_output_reports_errors_as_events() {
    let output = winre_resize()
        .args(["--dry-run", "--output", "json", "--os-drive", "1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(12));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr.lines().last().unwrap();
    let event: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(event["level"], "error");
    assert_eq!(event["code"], "winre.error");
}

#[test]
fn missing_explicit_config_is_a_generic_error() {
    let output = winre_resize()
        .args(["--dry-run", "--config", "definitely/not/here.toml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}
