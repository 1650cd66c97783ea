//! The `<WinreLocation>` element of the recovery agent's ReAgent.xml

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::winre::error::ResizeError;
use crate::winre::types::ImageLocation;

pub const ZERO_GUID: &str = "{00000000-0000-0000-0000-000000000000}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinreLocationRecord {
    pub path: String,
    pub id: String,
    pub offset: String,
    pub guid: String,
}

impl WinreLocationRecord {
    /// The empty sentinel written while the partition is being replaced
    pub fn cleared() -> Self {
        Self {
            path: String::new(),
            id: "0".to_string(),
            offset: "0".to_string(),
            guid: ZERO_GUID.to_string(),
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.path.is_empty()
            && is_zero_number(&self.offset)
            && is_zero_guid(&self.guid)
            && is_zero_number(&self.id)
    }

    pub fn offset_bytes(&self) -> Option<u64> {
        self.offset.trim().parse().ok()
    }

    /// A location usable to find the partition: non-zero GUID and offset
    pub fn to_image_location(&self) -> Option<ImageLocation> {
        let offset = self.offset_bytes().filter(|o| *o != 0)?;
        if is_zero_guid(&self.guid) {
            return None;
        }
        Some(ImageLocation {
            disk: None,
            partition: None,
            path: self.path.clone(),
            guid: Some(self.guid.clone()),
            offset: Some(offset),
        })
    }

    fn to_element(&self, self_closing: bool) -> String {
        format!(
            "<WinreLocation path=\"{}\" id=\"{}\" offset=\"{}\" guid=\"{}\"{}",
            escape(&self.path),
            escape(&self.id),
            escape(&self.offset),
            escape(&self.guid),
            if self_closing { "/>" } else { ">" }
        )
    }
}

fn is_zero_number(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.parse::<u64>().map(|v| v == 0).unwrap_or(false)
}

fn is_zero_guid(value: &str) -> bool {
    value
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .all(|c| c == '0')
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

lazy_static! {
    static ref ELEMENT_RE: Regex =
        Regex::new(r"<WinreLocation\b([^>]*?)(/?)>").expect("Invalid element pattern");
    static ref ATTRIBUTE_RE: Regex =
        Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).expect("Invalid attribute pattern");
}

/// Read the `<WinreLocation>` attributes, `None` if the element is absent
pub fn parse_winre_location(xml: &str) -> Result<Option<WinreLocationRecord>, ResizeError> {
    let Some(caps) = ELEMENT_RE.captures(xml) else {
        return Ok(None);
    };
    let attrs: HashMap<String, String> = caps
        .get(1)
        .map(|m| m.as_str())
        .map(|raw| {
            ATTRIBUTE_RE
                .captures_iter(raw)
                .map(|a| (a[1].to_ascii_lowercase(), unescape(&a[2])))
                .collect()
        })
        .unwrap_or_default();

    let attr = |name: &str| attrs.get(name).cloned().unwrap_or_default();
    Ok(Some(WinreLocationRecord {
        path: attr("path"),
        id: attr("id"),
        offset: attr("offset"),
        guid: attr("guid"),
    }))
}

/// Rewrite the `<WinreLocation>` element, keeping the rest of the document
pub fn replace_winre_location(
    xml: &str,
    record: &WinreLocationRecord,
) -> Result<String, ResizeError> {
    let Some(caps) = ELEMENT_RE.captures(xml) else {
        return Err(ResizeError::unparseable(
            "ReAgent.xml",
            "no WinreLocation element",
        ));
    };
    let Some(whole) = caps.get(0) else {
        return Err(ResizeError::unparseable(
            "ReAgent.xml",
            "no WinreLocation element",
        ));
    };
    let self_closing = caps.get(2).map(|m| !m.as_str().is_empty()).unwrap_or(false);

    let mut out = String::with_capacity(xml.len());
    out.push_str(&xml[..whole.start()]);
    out.push_str(&record.to_element(self_closing));
    out.push_str(&xml[whole.end()..]);
    Ok(out)
}
