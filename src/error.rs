use std::{fmt, io, str::Utf8Error};

use quick_xml::events::attributes::AttrError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures that escape the library. Only loading, saving and configuration I/O produce these; the
/// node and query surface reports soft problems through `tracing` and sentinel return values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum MindmapError {
    #[error("Text encoding error: {0}")]
    Encoding(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Mindmap structure error: {0}")]
    Structure(String),
    #[error("XML syntax error: {0}")]
    Xml(String),
}

impl From<io::Error> for MindmapError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => MindmapError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => MindmapError::PermissionDenied,
            _ => MindmapError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<quick_xml::Error> for MindmapError {
    fn from(x: quick_xml::Error) -> Self {
        MindmapError::Xml(format!("{x}"))
    }
}

impl From<AttrError> for MindmapError {
    fn from(x: AttrError) -> Self {
        MindmapError::Xml(format!("malformed attribute: {x}"))
    }
}

impl From<Utf8Error> for MindmapError {
    fn from(x: Utf8Error) -> Self {
        MindmapError::Encoding(format!("{x}"))
    }
}

impl From<fmt::Error> for MindmapError {
    fn from(x: fmt::Error) -> Self {
        MindmapError::Serialization(format!("{x}"))
    }
}

impl From<toml::de::Error> for MindmapError {
    fn from(src: toml::de::Error) -> MindmapError {
        MindmapError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for MindmapError {
    fn from(src: toml::ser::Error) -> MindmapError {
        MindmapError::Serialization(format!("Toml serialization error: {src}"))
    }
}
