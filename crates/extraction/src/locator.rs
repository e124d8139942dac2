//! Catalog lookup and virtual path composition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use vsi_archive::VirtualPath;

use crate::error::{ExtractError, Result};
use crate::resolver::CellResource;

/// Placeholder replaced by the cell code in the layer pattern.
pub const MESH_PLACEHOLDER: &str = "{mesh}";

/// Resolves dataset resources to the URL of their backing archive.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn archive_url(&self, resource_id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct CkanResponse {
    success: bool,
    #[serde(default)]
    result: Option<CkanResource>,
    #[serde(default)]
    error: Option<CkanErrorBody>,
}

#[derive(Debug, Deserialize)]
struct CkanResource {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CkanErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// CKAN action API client (`/action/resource_show`).
pub struct CkanCatalog {
    client: Client,
    base_url: String,
}

impl CkanCatalog {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CatalogClient for CkanCatalog {
    #[instrument(skip(self))]
    async fn archive_url(&self, resource_id: &str) -> Result<String> {
        let url = format!("{}/action/resource_show", self.base_url);
        metrics::counter!("bldg_catalog_lookups_total").increment(1);

        let response = self
            .client
            .get(&url)
            .query(&[("id", resource_id)])
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("request timed out: {}", e)
                } else {
                    format!("catalog unreachable: {}", e)
                };
                ExtractError::catalog_lookup(resource_id, message)
            })?;

        let status = response.status();
        // CKAN reports failures as JSON with success=false, often with a 4xx status
        let body: CkanResponse = response.json().await.map_err(|e| {
            ExtractError::catalog_lookup(
                resource_id,
                format!("malformed response (HTTP {}): {}", status.as_u16(), e),
            )
        })?;

        if !body.success {
            let message = body
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "catalog reported failure".to_string());
            return Err(ExtractError::catalog_lookup(resource_id, message));
        }

        body.result
            .and_then(|r| r.url)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ExtractError::catalog_lookup(resource_id, "response has no result url"))
    }
}

/// Composes per-cell virtual paths, looking each resource up once.
///
/// Lookups live as long as the locator; the extractor builds one per run.
pub struct RemoteLocator {
    catalog: Arc<dyn CatalogClient>,
    layer_pattern: String,
    resolved: Mutex<HashMap<String, String>>,
}

impl RemoteLocator {
    pub fn new(catalog: Arc<dyn CatalogClient>, layer_pattern: impl Into<String>) -> Self {
        Self {
            catalog,
            layer_pattern: layer_pattern.into(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, resource_id: &str) -> Option<String> {
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(resource_id)
            .cloned()
    }

    /// Archive URL of `resource_id`, from cache or the catalog.
    pub async fn archive_url(&self, resource_id: &str) -> Result<String> {
        if let Some(url) = self.cached(resource_id) {
            return Ok(url);
        }

        let url = self.catalog.archive_url(resource_id).await?;
        debug!(resource = resource_id, url = %url, "Resolved archive");
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(resource_id.to_string(), url.clone());
        Ok(url)
    }

    /// Virtual path of the cell's building file inside its resource archive.
    pub async fn locate(&self, pair: &CellResource) -> Result<VirtualPath> {
        let url = self.archive_url(&pair.resource_id).await?;
        compose_path(&url, &pair.cell_code, &self.layer_pattern)
            .map_err(|e| ExtractError::catalog_lookup(&pair.resource_id, e.to_string()))
    }

    /// Number of distinct resources resolved so far.
    pub fn resolved_count(&self) -> usize {
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// `<archive>` + pattern with `{mesh}` replaced by `cell_code`.
///
/// HTTP(S) archives are read remotely; anything else is taken as a local
/// path (`file://` URLs included).
pub fn compose_path(
    archive_url: &str,
    cell_code: &str,
    layer_pattern: &str,
) -> vsi_archive::Result<VirtualPath> {
    let entry = layer_pattern.replace(MESH_PLACEHOLDER, cell_code);
    let lower = archive_url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        VirtualPath::remote(archive_url, entry)
    } else {
        let local = archive_url.strip_prefix("file://").unwrap_or(archive_url);
        if !lower.ends_with(".zip") {
            warn!(archive = archive_url, "Archive path does not end in .zip");
        }
        VirtualPath::local(local, entry)
    }
}
