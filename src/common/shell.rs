//! PowerShell quoting helpers
//!
//! Cmdlet scripts are assembled as strings and passed to `powershell.exe -Command`,
//! so every interpolated value goes through here.

/// Quote a string as a PowerShell single-quoted literal
///
/// # Examples
///
/// ```ignore
/// assert_eq!(ps_quote("Recovery"), "'Recovery'");
/// assert_eq!(ps_quote("it's"), "'it''s'");
/// ```
pub fn ps_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote a string for a diskpart script argument such as `label="..."`
pub fn diskpart_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ps_quote() {
        assert_eq!(ps_quote(""), "''");
        assert_eq!(ps_quote("Recovery"), "'Recovery'");
        assert_eq!(ps_quote("it's"), "'it''s'");
        assert_eq!(ps_quote(r"E:\"), r"'E:\'");
    }

    #[test]
    fn test_diskpart_quote() {
        assert_eq!(diskpart_quote("Recovery"), "\"Recovery\"");
        assert_eq!(diskpart_quote("Re\"covery"), "\"Recovery\"");
    }
}
