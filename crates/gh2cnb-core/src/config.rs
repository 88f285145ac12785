use crate::migration::{ConvertOptions, DEFAULT_BRANCH};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File names searched in the working directory when no config path is given.
pub const CONFIG_CANDIDATES: &[&str] = &["gh2cnb.toml", ".gh2cnb.toml"];

/// Configuration file structure for gh2cnb.
///
/// ```toml
/// [convert]
/// anchors = false
/// default-branch = "trunk"
/// allow-cycles = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub convert: ConvertConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConvertConfig {
    /// Emit YAML anchors and merge keys
    #[serde(default = "default_anchors")]
    pub anchors: bool,

    /// Branch used when the workflow declares no push branches
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Convert cyclic job dependencies instead of failing
    #[serde(default)]
    pub allow_cycles: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            anchors: default_anchors(),
            default_branch: default_branch(),
            allow_cycles: false,
        }
    }
}

fn default_anchors() -> bool {
    true
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl Config {
    /// Load configuration from `path`, or from the first of
    /// [`CONFIG_CANDIDATES`] found in `dir`.
    ///
    /// Returns the defaults when no path is given and no candidate exists.
    pub fn load(path: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        for candidate in CONFIG_CANDIDATES {
            let path = dir.join(candidate);
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    pub fn to_options(&self) -> ConvertOptions {
        ConvertOptions {
            anchors: self.convert.anchors,
            default_branch: self.convert.default_branch.clone(),
            allow_cycles: self.convert.allow_cycles,
        }
    }
}
