//! YAML configuration for the clean command.
//!
//! ```yaml
//! version_threshold: 80000
//! no_drop: true
//! ddl_sanitize: false
//! default_schema: shop
//! db_name: shop_restored
//! metadata: tables-meta.tsv
//! prepend_file: pre-import.sql
//! blank_line_collapse: any
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use super::CleanOptions;
use crate::scanner::unwrap::{CollapseMode, DEFAULT_VERSION_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanYamlConfig {
    pub version_threshold: Option<u32>,
    pub no_drop: bool,
    pub ddl_sanitize: bool,
    pub default_schema: Option<String>,
    pub db_name: Option<String>,
    pub metadata: Option<PathBuf>,
    pub prepend_file: Option<PathBuf>,
    pub blank_line_collapse: Option<CollapseMode>,
}

impl CleanYamlConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: CleanYamlConfig = serde_yaml_ng::from_str(&content)?;

        if let Some(base) = path.parent() {
            config.metadata = config.metadata.map(|p| resolve(base, p));
            config.prepend_file = config.prepend_file.map(|p| resolve(base, p));
        }
        Ok(config)
    }

    /// Core options from this file; `None` fields fall back to defaults.
    pub fn options(&self) -> CleanOptions {
        CleanOptions {
            version_threshold: self.version_threshold.unwrap_or(DEFAULT_VERSION_THRESHOLD),
            no_drop: self.no_drop,
            ddl_sanitize: self.ddl_sanitize,
            default_schema: self.default_schema.clone(),
            collapse: self.blank_line_collapse.unwrap_or_default(),
        }
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
