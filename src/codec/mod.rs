//! Reading and writing the mindmap file format.
//!
//! ## Key Components
//!
//! - [`FormatVersion`] - the `freeplane <version>` token of the `map` element and the rules keyed
//!   on it
//! - [`decode_document`] - bytes to element tree, including the load-time repair pass
//! - [`encode_document`] - element tree to bytes, including legacy escaping
//! - [`xml`] - the XML reader and writer
//! - [`encoding`] - byte encodings of the two format eras
//!
//! ## Format eras
//!
//! | version      | byte encoding | umlaut/nbsp escaping on save |
//! |--------------|---------------|------------------------------|
//! | `<= 1.6`     | windows-1252  | yes                          |
//! | `1.7`        | UTF-8         | yes                          |
//! | `>= 1.8`     | UTF-8         | no                           |
//!
//! A file whose version cannot be determined is treated like the newest era.
//!
//! ```rust
//! use freeplane_dom::codec::{decode_document, encode_document};
//!
//! let src = "<map version=\"freeplane 1.5.0\">\n<node TEXT=\"M&#xfc;ller\"/>\n</map>\n";
//! let (version, root) = decode_document(src.as_bytes()).unwrap();
//! assert!(version.uses_legacy_encoding());
//! assert_eq!(root.child(0).unwrap().get("TEXT").as_deref(), Some("Müller"));
//! assert_eq!(encode_document(&root, &version), src.as_bytes());
//! ```
use crate::{element::Element, error::MindmapError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod encoding;
pub mod xml;

static VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"freeplane\s+([^"'\s>]+)"#).expect("version token regex to compile")
});

pub const DEFAULT_VERSION: &str = "1.3.0";

/// The format version a map declares, e.g. `1.9.13`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatVersion {
    raw: String,
    major_minor: Option<(u32, u32)>,
}

impl FormatVersion {
    pub fn parse(raw: &str) -> FormatVersion {
        let raw = raw.trim();
        let mut parts = raw.split('.').map(|p| p.parse::<u32>());
        let major_minor = match (parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor))) => Some((major, minor)),
            (Some(Ok(major)), None) => Some((major, 0)),
            _ => None,
        };
        FormatVersion {
            raw: raw.to_string(),
            major_minor,
        }
    }

    /// Find the version token on the first line of a file (or, failing that, within the opening
    /// `map` tag).
    pub fn detect(bytes: &[u8]) -> Option<FormatVersion> {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]);
        let first_line = head.lines().next().unwrap_or_default();
        let map_tag = head
            .find("<map")
            .map(|start| &head[start..])
            .and_then(|rest| rest.find('>').map(|end| &rest[..end]));
        // bound so the temporaries are dropped before `head`
        let found = [Some(first_line), map_tag]
            .into_iter()
            .flatten()
            .find_map(|text| VERSION_TOKEN.captures(text))
            .map(|caps| FormatVersion::parse(&caps[1]));
        found
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The `version` attribute value of the `map` element.
    pub fn map_attribute(&self) -> String {
        format!("freeplane {}", self.raw)
    }

    pub fn uses_legacy_encoding(&self) -> bool {
        matches!(self.major_minor, Some(v) if v <= (1, 6))
    }

    pub fn needs_legacy_escaping(&self) -> bool {
        matches!(self.major_minor, Some((1, minor)) if minor < 8)
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        FormatVersion::parse(DEFAULT_VERSION)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Decode and parse a map file. Input that fails to parse because of HTML `&nbsp;` entities
/// (written by some tools) is repaired once and parsed again.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn decode_document(bytes: &[u8]) -> Result<(FormatVersion, Element), MindmapError> {
    let detected = FormatVersion::detect(bytes);
    if detected.is_none() {
        tracing::debug!("no version token found");
    }
    let version = detected.unwrap_or_else(|| FormatVersion::parse(""));
    let text = encoding::decode(bytes, &version);
    let root = match xml::parse(&text) {
        Ok(root) => root,
        Err(first) if text.contains("&nbsp;") => {
            tracing::info!("parse failed ({first}), retrying with &nbsp; entities replaced");
            xml::parse(&text.replace("&nbsp;", "&#160;"))?
        }
        Err(e) => return Err(e),
    };
    Ok((version, root))
}

/// Serialize a map for the given version. Output always starts at the `map` element.
pub fn encode_document(root: &Element, version: &FormatVersion) -> Vec<u8> {
    let mut text = xml::write(root);
    if !text.starts_with("<map") {
        text = match text.split_once('\n') {
            Some((_, rest)) => rest.to_string(),
            None => text,
        };
    }
    if version.needs_legacy_escaping() {
        text = encoding::legacy_escape(&text).into_owned();
    }
    encoding::encode(&text, version)
}
