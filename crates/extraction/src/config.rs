//! Configuration for the extraction pipeline.

use std::path::Path;
use std::time::Duration;

use bldg_common::LodTemplate;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::locator::MESH_PLACEHOLDER;

/// Public PLATEAU catalog (CKAN action API root).
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://www.geospatial.jp/ckan/api/3";

/// Building file of a cell inside a municipality archive.
pub const DEFAULT_LAYER_PATTERN: &str = "udx/bldg/{mesh}_bldg_6697_op.gml";

/// Configuration for one extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// CKAN API root; `/action/resource_show` is appended.
    pub catalog_base_url: String,

    /// Whole-request timeout for catalog and archive calls, in seconds.
    pub request_timeout_secs: u64,

    /// Connection timeout, in seconds.
    pub connect_timeout_secs: u64,

    /// Cells fetched concurrently.
    pub fetch_concurrency: usize,

    /// Vertical LOD template, fixed for every run of the extractor.
    pub lod: LodTemplate,

    /// Entry name inside the archive; `{mesh}` is replaced by the cell code.
    pub layer_pattern: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            fetch_concurrency: 4,
            lod: LodTemplate::Lod1,
            layer_pattern: DEFAULT_LAYER_PATTERN.to_string(),
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` yields for each variable.
    ///
    /// Unparseable values leave the default in place.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("CATALOG_BASE_URL") {
            config.catalog_base_url = val;
        }

        if let Some(val) = lookup("REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }

        if let Some(val) = lookup("CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.connect_timeout_secs = secs;
            }
        }

        if let Some(val) = lookup("FETCH_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.fetch_concurrency = n;
            }
        }

        if let Some(val) = lookup("BLDG_LOD") {
            if let Ok(lod) = val.parse() {
                config.lod = lod;
            }
        }

        if let Some(val) = lookup("BLDG_LAYER_PATTERN") {
            config.layer_pattern = val;
        }

        config
    }

    /// Load configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExtractError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ExtractError::InvalidConfig(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.catalog_base_url.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "catalog_base_url must not be empty".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "timeouts must be > 0".to_string(),
            ));
        }

        if self.fetch_concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "fetch_concurrency must be > 0".to_string(),
            ));
        }

        if !self.layer_pattern.contains(MESH_PLACEHOLDER) {
            return Err(ExtractError::InvalidConfig(format!(
                "layer_pattern must contain {}",
                MESH_PLACEHOLDER
            )));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
