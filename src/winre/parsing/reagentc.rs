//! `reagentc /info` output parsing

use lazy_static::lazy_static;
use regex::Regex;

use crate::winre::error::ResizeError;
use crate::winre::types::{ImageLocation, RecoveryAgentState};

lazy_static! {
    static ref STATUS_RE: Regex =
        Regex::new(r"(?im)^\s*Windows RE status:\s*(\S+)").expect("Invalid status pattern");
    static ref LOCATION_RE: Regex = Regex::new(r"(?im)^\s*Windows RE location:[ \t]*(.*?)\s*$")
        .expect("Invalid location pattern");
    static ref DEVICE_RE: Regex = Regex::new(r"(?i)harddisk(\d+)\\partition(\d+)(\\.*)?$")
        .expect("Invalid device path pattern");
}

/// Parse the status and location lines of `reagentc /info`
///
/// Only the English labels are recognised. Output without a status line is
/// rejected rather than guessed.
pub fn parse_reagentc_info(output: &str) -> Result<RecoveryAgentState, ResizeError> {
    let status = STATUS_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .ok_or_else(|| ResizeError::unparseable("reagentc", "no 'Windows RE status' line"))?;

    let enabled = match status.as_str() {
        "enabled" => true,
        "disabled" => false,
        other => {
            return Err(ResizeError::unparseable(
                "reagentc",
                format!("unknown Windows RE status '{other}'"),
            ));
        }
    };

    let location = match LOCATION_RE.captures(output).and_then(|c| c.get(1)) {
        Some(m) if !m.as_str().is_empty() => Some(parse_location(m.as_str())),
        _ => None,
    };

    Ok(RecoveryAgentState { enabled, location })
}

/// `\\?\GLOBALROOT\device\harddisk0\partition4\Recovery\WindowsRE`
fn parse_location(raw: &str) -> ImageLocation {
    let Some(caps) = DEVICE_RE.captures(raw) else {
        return ImageLocation {
            path: raw.to_string(),
            ..Default::default()
        };
    };

    let disk = caps.get(1).and_then(|m| m.as_str().parse().ok());
    let partition = caps.get(2).and_then(|m| m.as_str().parse().ok());
    let path = caps
        .get(3)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    ImageLocation {
        disk,
        partition,
        path,
        guid: None,
        offset: None,
    }
}
