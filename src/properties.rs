//! Value types and wire-format constants shared by nodes and documents.
use crate::element::Element;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

// Builtin icon names as stored in the `BUILTIN` attribute of `icon` elements.
pub const ICON_EXCLAMATION: &str = "yes";
pub const ICON_LIST: &str = "list";
pub const ICON_QUESTION: &str = "help";
pub const ICON_CHECKED: &str = "button_ok";
pub const ICON_BOOKMARK: &str = "bookmark";
pub const ICON_PRIO1: &str = "full-1";
pub const ICON_PRIO2: &str = "full-2";

/// `TYPE` values of `richcontent` elements.
pub const RICH_DETAILS: &str = "DETAILS";
pub const RICH_NOTE: &str = "NOTE";
pub const RICH_NODE: &str = "NODE";

/// Localized-text keys of the style sheet sections.
pub const STYLES_ROOT: &str = "styles.root_node";
pub const STYLES_PREDEFINED: &str = "styles.predefined";
pub const STYLES_USER_DEFINED: &str = "styles.user-defined";

/// Where a node stands relative to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// The visible root of a document.
    Root,
    /// Reachable from a document's root.
    Attached,
    /// Entry point of a subtree that belongs to no document.
    DetachedHead,
    /// Any other node of such a subtree.
    DetachedInterior,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Root => "root",
            NodeState::Attached => "attached",
            NodeState::DetachedHead => "detached head",
            NodeState::DetachedInterior => "detached interior",
        };
        f.write_str(s)
    }
}

/// Visual facets of a user-defined style. Each facet is independently present or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgcolor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontsize: Option<String>,
}

impl StyleSettings {
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.bgcolor.is_none()
            && self.fontname.is_none()
            && self.fontsize.is_none()
    }

    /// Read the facets declared on a style node (`COLOR`, `BACKGROUND_COLOR` and a nested `font`).
    pub fn from_style_node(el: &Element) -> StyleSettings {
        let font = el.find("font");
        StyleSettings {
            color: el.get("COLOR"),
            bgcolor: el.get("BACKGROUND_COLOR"),
            fontname: font.as_ref().and_then(|f| f.get("NAME")),
            fontsize: font.as_ref().and_then(|f| f.get("SIZE")),
        }
    }

    /// Write the present facets onto a style node, sharing one `font` child for name and size.
    pub fn apply_to(&self, el: &Element) {
        if let Some(color) = &self.color {
            el.set("COLOR", color.as_str());
        }
        if let Some(bgcolor) = &self.bgcolor {
            el.set("BACKGROUND_COLOR", bgcolor.as_str());
        }
        if self.fontname.is_some() || self.fontsize.is_some() {
            let font = el.find("font").unwrap_or_else(|| el.subelement("font"));
            if let Some(name) = &self.fontname {
                font.set("NAME", name.as_str());
            }
            if let Some(size) = &self.fontsize {
                font.set("SIZE", size.as_str());
            }
        }
    }
}

/// Cosmetic attributes of an arrow link. Absent fields fall back to the editor's defaults when
/// written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrowLinkSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontsize: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startinclination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endinclination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startarrow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endarrow: Option<String>,
}

impl ArrowLinkSettings {
    /// Write every attribute (defaults for the absent ones) onto an `arrowlink` element. `DASH`
    /// is only written when given.
    pub fn apply_to(&self, el: &Element) {
        fn pick<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
            value.as_deref().filter(|v| !v.is_empty()).unwrap_or(default)
        }
        el.set("SHAPE", pick(&self.shape, "CUBIC_CURVE"));
        el.set("COLOR", pick(&self.color, "#000000"));
        el.set("WIDTH", pick(&self.width, "2"));
        el.set("TRANSPARENCY", pick(&self.transparency, "80"));
        if let Some(dash) = self.dash.as_deref().filter(|d| !d.is_empty()) {
            el.set("DASH", dash);
        }
        el.set("FONT_SIZE", pick(&self.fontsize, "9"));
        el.set("FONT_FAMILY", pick(&self.font, "SansSerif"));
        el.set("STARTINCLINATION", pick(&self.startinclination, "131;0;"));
        el.set("ENDINCLINATION", pick(&self.endinclination, "131;0;"));
        el.set("STARTARROW", pick(&self.startarrow, "NONE"));
        el.set("ENDARROW", pick(&self.endarrow, "DEFAULT"));
    }
}

/// Named arrow link presets. The file format has no registry for these, so they live with the
/// caller (typically loaded from [`crate::config::MindmapConfig`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrowStyles(BTreeMap<String, ArrowLinkSettings>);

impl ArrowStyles {
    pub fn new() -> ArrowStyles {
        ArrowStyles::default()
    }

    /// Register or replace a preset.
    pub fn add_style(&mut self, name: &str, settings: ArrowLinkSettings) -> bool {
        self.0.insert(name.to_string(), settings);
        true
    }

    pub fn get(&self, name: &str) -> Option<&ArrowLinkSettings> {
        self.0.get(name)
    }

    pub fn styles(&self) -> &BTreeMap<String, ArrowLinkSettings> {
        &self.0
    }
}

/// Current time as decimal epoch milliseconds, the format of `CREATED` and `MODIFIED`.
pub fn now_millis() -> String {
    Local::now().timestamp_millis().to_string()
}

pub fn millis_string(when: DateTime<Local>) -> String {
    when.timestamp_millis().to_string()
}

/// Parse an epoch-millisecond attribute value.
pub fn parse_millis(value: &str) -> Option<DateTime<Local>> {
    let millis: i64 = value.trim().parse().ok()?;
    Local.timestamp_millis_opt(millis).single()
}
