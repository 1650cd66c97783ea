//! diskpart script generation and output checks (MBR disks only)

use crate::common::shell::diskpart_quote;
use crate::winre::tool::ExternalToolResult;

/// Printed after `create partition`
pub const CREATE_MARKER: &str = "DiskPart succeeded in creating the specified partition";
/// Printed after `format`; the completion marker for the whole script
pub const FORMAT_MARKER: &str = "DiskPart successfully formatted the volume";
/// Printed by any failing command
pub const ERROR_MARKER: &str = "DiskPart has encountered an error";

/// MBR partition type of a hidden recovery partition
pub const MBR_RECOVERY_ID: &str = "27";

pub fn build_recovery_script(disk_number: u32, size_mb: u64, label: &str) -> String {
    format!(
        "select disk {disk_number}\r\n\
         create partition primary size={size_mb} id={MBR_RECOVERY_ID}\r\n\
         format quick fs=ntfs label={}\r\n\
         set id={MBR_RECOVERY_ID}\r\n",
        diskpart_quote(label)
    )
}

/// Success needs exit code 0, both the create and format markers, and no
/// error marker. Anything else, including unrecognised output, is failure.
pub fn diskpart_succeeded(result: &ExternalToolResult) -> bool {
    let stdout = &result.stdout;
    result.success()
        && stdout.contains(CREATE_MARKER)
        && stdout.contains(FORMAT_MARKER)
        && !stdout.contains(ERROR_MARKER)
}
