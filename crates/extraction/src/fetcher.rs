//! Per-cell fetch and parse.

use std::sync::Arc;

use bldg_common::{FeatureCollection, LodTemplate};
use citygml_parser::CityGmlParser;
use tracing::{debug, info, instrument};
use vsi_archive::{ArchiveReader, VirtualPath};

use crate::error::{ExtractError, Result};

/// Outcome of fetching one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellData {
    /// The cell file was read and parsed.
    Fetched(FeatureCollection),
    /// The archive has no file for this cell.
    NotSurveyed,
}

impl CellData {
    pub fn is_surveyed(&self) -> bool {
        matches!(self, CellData::Fetched(_))
    }

    /// Collection contributed to the merge; empty for unsurveyed cells.
    pub fn into_collection(self) -> FeatureCollection {
        match self {
            CellData::Fetched(collection) => collection,
            CellData::NotSurveyed => FeatureCollection::default(),
        }
    }
}

/// Reads cell files out of their archives and parses them with a fixed
/// LOD template.
#[derive(Clone)]
pub struct CellFetcher {
    reader: Arc<ArchiveReader>,
    parser: CityGmlParser,
}

impl CellFetcher {
    pub fn new(reader: Arc<ArchiveReader>, template: LodTemplate) -> Self {
        Self {
            reader,
            parser: CityGmlParser::new(template),
        }
    }

    #[instrument(skip(self, path), fields(path = %path, lod = %self.parser.template()))]
    pub async fn fetch(&self, path: &VirtualPath) -> Result<CellData> {
        let data = self
            .reader
            .read_entry(path)
            .await
            .map_err(|e| ExtractError::from_archive(path.to_string(), e))?;

        let Some(data) = data else {
            info!("Cell not surveyed");
            metrics::counter!("bldg_cells_not_surveyed_total").increment(1);
            return Ok(CellData::NotSurveyed);
        };

        let parser = self.parser;
        let bytes = data.len();
        // quick-xml parsing is CPU bound; keep it off the async workers
        let collection = tokio::task::spawn_blocking(move || parser.parse(&data))
            .await
            .map_err(|e| ExtractError::fetch(path.to_string(), format!("parse task failed: {}", e)))?
            .map_err(|e| ExtractError::from_citygml(path.to_string(), e))?;

        debug!(bytes, features = collection.len(), "Parsed cell");
        metrics::counter!("bldg_cells_fetched_total").increment(1);
        Ok(CellData::Fetched(collection))
    }
}
