use crate::{codec::DEFAULT_VERSION, error::MindmapError, ident::IdAllocator, properties::ArrowStyles};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::Path,
    sync::Arc,
};

/// Settings for freshly created maps.
///
/// ```toml
/// default_version = "1.9.13"
/// id_seed = "240101"
///
/// [arrow_styles.dashed]
/// color = "#ff0000"
/// dash = "3 3"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindmapConfig {
    /// Format version written into new maps.
    pub default_version: String,
    /// Pins the identifier seed instead of deriving it from the current date.
    pub id_seed: Option<String>,
    pub arrow_styles: ArrowStyles,
}

impl Default for MindmapConfig {
    fn default() -> Self {
        MindmapConfig {
            default_version: DEFAULT_VERSION.to_string(),
            id_seed: None,
            arrow_styles: ArrowStyles::default(),
        }
    }
}

impl MindmapConfig {
    pub fn from_toml_str(content: &str) -> Result<MindmapConfig, MindmapError> {
        Ok(toml::from_str(content)?)
    }

    /// Read the configuration at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<MindmapConfig, MindmapError> {
        tracing::debug!("Attempting to read config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(MindmapConfig::default());
        }
        let content = read_to_string(path)?;
        MindmapConfig::from_toml_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), MindmapError> {
        tracing::debug!("Attempting to write config to: {:?}", path);
        let toml_string = toml::to_string(self)?;
        write(path, toml_string)?;
        Ok(())
    }

    /// A dedicated allocator when a seed is pinned, the process-wide one otherwise.
    pub fn allocator(&self) -> Arc<IdAllocator> {
        match &self.id_seed {
            Some(seed) => Arc::new(IdAllocator::with_seed(seed.as_str())),
            None => IdAllocator::global(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mindmap::Mindmap, properties::ArrowLinkSettings};
    use tempfile::TempDir;
    use test_log::test;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MindmapConfig::from_toml_str("id_seed = \"240101\"").unwrap();
        assert_eq!(config.default_version, "1.3.0");
        assert_eq!(config.id_seed.as_deref(), Some("240101"));
        assert!(config.arrow_styles.styles().is_empty());
    }

    #[test]
    fn invalid_toml_is_a_serialization_error() {
        let res = MindmapConfig::from_toml_str("default_version = [");
        assert!(matches!(res, Err(MindmapError::Serialization(_))));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = MindmapConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, MindmapConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("freeplane.toml");
        let mut config = MindmapConfig {
            default_version: "1.9.13".to_string(),
            id_seed: Some("777".to_string()),
            ..Default::default()
        };
        config.arrow_styles.add_style(
            "alert",
            ArrowLinkSettings {
                color: Some("#ff0000".to_string()),
                ..Default::default()
            },
        );
        config.save(&path).unwrap();
        let loaded = MindmapConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn configured_map() {
        let config = MindmapConfig::from_toml_str(
            "default_version = \"1.9.13\"\nid_seed = \"4242\"\n",
        )
        .unwrap();
        let map = Mindmap::with_config(&config);
        assert_eq!(map.version().as_str(), "1.9.13");
        assert_eq!(map.rootnode().id(), "ID_42420001");
    }
}
