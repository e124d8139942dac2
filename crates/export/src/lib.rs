//! Feature collection exporters.
//!
//! Three encodings are supported:
//! - GeoJSON, serialized straight into memory
//! - GeoPackage, a single `bldg` layer written through SQLite
//! - GeoParquet, a WKB geometry column written through Arrow
//!
//! The file-based encodings write into a scratch file that is removed when
//! the export returns, whether it succeeded or not.

pub mod encoding;
pub mod error;
pub mod gpkg;
pub mod geoparquet;
pub mod json;

use std::path::{Path, PathBuf};

use bldg_common::FeatureCollection;
use tempfile::NamedTempFile;
use tracing::{info, instrument};

pub use encoding::{Encoding, ExportPayload, DEFAULT_FILE_STEM};
pub use error::{ExportError, Result};

/// EPSG code of exported geometries (JGD2011 geographic 2D).
pub const EXPORT_SRS_ID: i32 = 6668;

/// Serializes feature collections.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    scratch_dir: Option<PathBuf>,
}

impl Exporter {
    /// Exporter using the system temporary directory for scratch files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exporter placing scratch files in `dir`.
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(dir.into()),
        }
    }

    fn scratch_file(&self, encoding: Encoding) -> Result<NamedTempFile> {
        let suffix = format!(".{}", encoding.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix("bldg_export_").suffix(&suffix);
        let file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }

    /// Encode `collection`.
    #[instrument(skip(self, collection), fields(encoding = %encoding, features = collection.len()))]
    pub async fn export(
        &self,
        collection: &FeatureCollection,
        encoding: Encoding,
    ) -> Result<ExportPayload> {
        let bytes = match encoding {
            Encoding::GeoJson => json::to_geojson(collection)?,
            Encoding::GeoPackage => {
                let scratch = self.scratch_file(encoding)?;
                gpkg::write_geopackage(collection, scratch.path()).await?;
                read_back(scratch.path()).await?
            }
            Encoding::GeoParquet => {
                let scratch = self.scratch_file(encoding)?;
                geoparquet::write_geoparquet(collection, scratch.reopen()?)?;
                read_back(scratch.path()).await?
            }
        };

        metrics::counter!("bldg_export_total", "encoding" => encoding.extension()).increment(1);
        metrics::counter!("bldg_export_features_total").increment(collection.len() as u64);
        info!(bytes = bytes.len(), "Export complete");

        Ok(ExportPayload::new(encoding, bytes))
    }
}

async fn read_back(path: &Path) -> Result<Vec<u8>> {
    Ok(tokio::fs::read(path).await?)
}
