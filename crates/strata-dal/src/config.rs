//! TOML configuration for the DAL host.
//!
//! ```toml
//! [[dal.layer]]
//! kind = "file_store"
//! base_path = "/data/strata-cache"
//! archives = ["ExampleArchive"]
//!
//! [[dal.layer]]
//! kind = "sqlite"
//! connection = "/data/cells.sqlite"
//!
//! [[dal.layer]]
//! kind = "source"
//! ```
//!
//! Layers are consulted in file order.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DalError, DalResult};
use crate::layer::DataAccessLayer;
use crate::layers::{FileStoreLayer, MemoryLayer, SourceLayer, SqliteLayer};

/// File name looked up in the working directory and in `$STRATA_CONFIG_DIR`.
pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// File name looked up in the home directory.
pub const HOME_CONFIG_FILE_NAME: &str = ".strata.toml";

/// Environment variable naming an extra configuration directory.
pub const CONFIG_DIR_ENV: &str = "STRATA_CONFIG_DIR";

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub dal: DalConfig,
}

/// The ordered layer list of a DAL host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DalConfig {
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerConfig>,
}

/// One layer section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerConfig {
    /// Per-column files under a base directory.
    FileStore {
        #[serde(default)]
        name: Option<String>,
        base_path: PathBuf,
        /// Only answer for these archives.
        #[serde(default)]
        archives: Option<Vec<String>>,
    },
    /// A SQLite database of cells.
    Sqlite {
        #[serde(default)]
        name: Option<String>,
        /// A file path, or `:memory:`.
        connection: String,
        #[serde(default)]
        archives: Option<Vec<String>>,
    },
    /// An in-process cache, empty until ingested into.
    Memory {
        #[serde(default)]
        name: Option<String>,
        /// Only answer for these column types.
        #[serde(default)]
        column_types: Option<Vec<String>>,
    },
    /// The columns' own sources.
    Source {
        #[serde(default)]
        name: Option<String>,
    },
}

impl LayerConfig {
    /// Construct the layer this section describes.
    pub fn build(&self) -> DalResult<Arc<dyn DataAccessLayer>> {
        Ok(match self {
            Self::FileStore {
                name,
                base_path,
                archives,
            } => {
                let mut layer = FileStoreLayer::new(base_path)?;
                if let Some(name) = name {
                    layer = layer.with_name(name);
                }
                if let Some(archives) = archives {
                    layer = layer.with_archives(archives.iter().cloned());
                }
                Arc::new(layer)
            }
            Self::Sqlite {
                name,
                connection,
                archives,
            } => {
                let mut layer = SqliteLayer::open(connection)?;
                if let Some(name) = name {
                    layer = layer.with_name(name);
                }
                if let Some(archives) = archives {
                    layer = layer.with_archives(archives.iter().cloned());
                }
                Arc::new(layer)
            }
            Self::Memory { name, column_types } => {
                let mut layer = MemoryLayer::new(name.as_deref().unwrap_or("memory"));
                if let Some(types) = column_types {
                    layer = layer.indexing(types.iter().cloned().collect::<BTreeSet<_>>());
                }
                Arc::new(layer)
            }
            Self::Source { name } => Arc::new(SourceLayer::new(name.as_deref().unwrap_or("source"))),
        })
    }
}

impl StrataConfig {
    /// Parse a configuration document.
    pub fn from_toml_str(text: &str) -> DalResult<Self> {
        toml::from_str(text).map_err(|e| DalError::Config(e.to_string()))
    }

    /// Read and parse one configuration file.
    pub fn load(path: &Path) -> DalResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| DalError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| DalError::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), layers = config.dal.layers.len(), "loaded configuration");
        Ok(config)
    }

    /// Merge the configuration files that exist among `candidates`, lowest
    /// priority first. A later file with layers replaces the layer list.
    pub fn load_first_to_last(candidates: &[PathBuf]) -> DalResult<Self> {
        let mut merged = Self::default();
        for path in candidates.iter().filter(|p| p.is_file()) {
            let config = Self::load(path)?;
            if !config.dal.layers.is_empty() {
                merged.dal = config.dal;
            }
        }
        Ok(merged)
    }

    /// Load from the standard locations: `~/.strata.toml`, then
    /// `$STRATA_CONFIG_DIR/strata.toml`, then `./strata.toml`.
    pub fn discover() -> DalResult<Self> {
        Self::load_first_to_last(&Self::standard_locations())
    }

    /// The candidate files [`discover`](Self::discover) considers, lowest
    /// priority first.
    pub fn standard_locations() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(HOME_CONFIG_FILE_NAME));
        }
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            candidates.push(PathBuf::from(dir).join(CONFIG_FILE_NAME));
        }
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(CONFIG_FILE_NAME));
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_no_layers() {
        let c = StrataConfig::default();
        assert!(c.dal.layers.is_empty());
    }

    #[test]
    fn parse_all_layer_kinds() {
        let c = StrataConfig::from_toml_str(
            r#"
            [[dal.layer]]
            kind = "file_store"
            base_path = "/tmp/cache"
            archives = ["Example"]

            [[dal.layer]]
            kind = "sqlite"
            name = "cells"
            connection = ":memory:"

            [[dal.layer]]
            kind = "memory"
            column_types = ["JsonTableColumn"]

            [[dal.layer]]
            kind = "source"
            "#,
        )
        .unwrap();
        assert_eq!(c.dal.layers.len(), 4);
        assert_eq!(
            c.dal.layers[0],
            LayerConfig::FileStore {
                name: None,
                base_path: PathBuf::from("/tmp/cache"),
                archives: Some(vec!["Example".into()]),
            }
        );
        assert!(matches!(&c.dal.layers[1], LayerConfig::Sqlite { name: Some(n), .. } if n == "cells"));
        assert!(matches!(c.dal.layers[3], LayerConfig::Source { name: None }));
    }

    #[test]
    fn unknown_kind_is_config_error() {
        let err = StrataConfig::from_toml_str("[[dal.layer]]\nkind = \"spark\"\n").unwrap_err();
        assert!(matches!(err, DalError::Config(_)));
    }

    #[test]
    fn missing_required_option_is_config_error() {
        assert!(StrataConfig::from_toml_str("[[dal.layer]]\nkind = \"file_store\"\n").is_err());
    }

    #[test]
    fn later_files_replace_layers() {
        let dir = TempDir::new().unwrap();
        let low = dir.path().join("low.toml");
        let high = dir.path().join("high.toml");
        let empty = dir.path().join("empty.toml");
        fs::write(&low, "[[dal.layer]]\nkind = \"source\"\nname = \"low\"\n").unwrap();
        fs::write(&high, "[[dal.layer]]\nkind = \"source\"\nname = \"high\"\n").unwrap();
        fs::write(&empty, "").unwrap();

        let c = StrataConfig::load_first_to_last(&[
            low.clone(),
            high,
            empty,
            dir.path().join("absent.toml"),
        ])
        .unwrap();
        assert_eq!(c.dal.layers, vec![LayerConfig::Source { name: Some("high".into()) }]);

        let only_low = StrataConfig::load_first_to_last(&[low]).unwrap();
        assert_eq!(only_low.dal.layers.len(), 1);
    }

    #[test]
    fn malformed_file_names_its_path() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[[dal.layer]\n").unwrap();
        let err = StrataConfig::load(&bad).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn build_layers_from_config() {
        let dir = TempDir::new().unwrap();
        let config = DalConfig {
            layers: vec![
                LayerConfig::FileStore {
                    name: Some("files".into()),
                    base_path: dir.path().to_path_buf(),
                    archives: None,
                },
                LayerConfig::Memory {
                    name: None,
                    column_types: None,
                },
                LayerConfig::Sqlite {
                    name: None,
                    connection: ":memory:".into(),
                    archives: None,
                },
                LayerConfig::Source { name: None },
            ],
        };
        let host = crate::DataAccessLayerHost::from_config(&config).unwrap();
        assert_eq!(
            host.layer_names().unwrap(),
            ["files", "memory", "sqlite::memory:", "source"]
        );
    }

    #[test]
    fn file_store_requires_existing_directory() {
        let config = LayerConfig::FileStore {
            name: None,
            base_path: PathBuf::from("/definitely/not/here"),
            archives: None,
        };
        assert!(matches!(config.build(), Err(DalError::InvalidLayer(_))));
    }
}
