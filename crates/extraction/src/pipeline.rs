//! The extraction run: resolve, locate, fetch, merge, clip, filter.

use std::fmt;
use std::sync::Arc;

use bldg_common::{AreaOfInterest, FeatureCollection, LodTemplate};
use export::{Encoding, ExportPayload, Exporter};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use tracing::{debug, info, instrument};
use vsi_archive::ArchiveReader;

use crate::clip::SpatialClipper;
use crate::config::ExtractorConfig;
use crate::error::{ExtractError, Result};
use crate::fetcher::{CellData, CellFetcher};
use crate::filter::AttributeFilter;
use crate::locator::{CatalogClient, CkanCatalog, RemoteLocator};
use crate::merge::merge;
use crate::reference::ReferenceData;
use crate::resolver::CellResolver;

/// States of one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Resolving,
    Fetching,
    Merging,
    Filtering,
    Ready,
    Empty,
    Exporting,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Resolving => "resolving",
            RunState::Fetching => "fetching",
            RunState::Merging => "merging",
            RunState::Filtering => "filtering",
            RunState::Ready => "ready",
            RunState::Empty => "empty",
            RunState::Exporting => "exporting",
            RunState::Done => "done",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the state of a run.
#[derive(Debug)]
struct RunTracker {
    state: RunState,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
    }
}

/// Why a run produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// No grid cell with a current dataset intersects the AOI.
    NoCoverage,
    /// Cells were read but no feature survived clipping and filtering.
    NoFeatures,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::NoCoverage => f.write_str("no dataset covers the area of interest"),
            EmptyReason::NoFeatures => f.write_str("no building matched the area and filters"),
        }
    }
}

/// Result of a completed run. An empty result is not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Ready(FeatureCollection),
    Empty(EmptyReason),
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        matches!(self, Extraction::Empty(_))
    }

    pub fn collection(&self) -> Option<&FeatureCollection> {
        match self {
            Extraction::Ready(collection) => Some(collection),
            Extraction::Empty(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.collection().map_or(0, FeatureCollection::len)
    }

    /// Serialize a ready result. May be called repeatedly with different
    /// encodings.
    #[instrument(skip(self, exporter), fields(encoding = %encoding))]
    pub async fn export(&self, exporter: &Exporter, encoding: Encoding) -> Result<ExportPayload> {
        let collection = match self {
            Extraction::Ready(collection) => collection,
            Extraction::Empty(reason) => {
                return Err(ExtractError::NothingToExport(reason.to_string()));
            }
        };

        let mut run = RunTracker {
            state: RunState::Ready,
        };
        run.advance(RunState::Exporting);
        let payload = exporter.export(collection, encoding).await?;
        run.advance(RunState::Done);
        Ok(payload)
    }
}

/// Runs extractions against shared reference data.
///
/// Reference data and the HTTP client are shared; each call to [`extract`]
/// is an independent run with its own resource lookups and archive
/// directories, so a run never sees catalog answers or archive contents
/// cached by an earlier one.
///
/// [`extract`]: Extractor::extract
pub struct Extractor {
    reference: Arc<ReferenceData>,
    catalog: Arc<dyn CatalogClient>,
    client: Client,
    layer_pattern: String,
    lod: LodTemplate,
    concurrency: usize,
}

/// Lookups and archive directories cached for the duration of one run.
struct RunContext {
    locator: RemoteLocator,
    fetcher: CellFetcher,
}

impl Extractor {
    /// Build an extractor talking to the configured CKAN catalog.
    pub fn new(reference: Arc<ReferenceData>, config: &ExtractorConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ExtractError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        let catalog = Arc::new(CkanCatalog::new(client.clone(), &config.catalog_base_url));

        info!(
            catalog = %config.catalog_base_url,
            lod = %config.lod,
            concurrency = config.fetch_concurrency,
            "Extractor ready"
        );

        Ok(Self {
            reference,
            catalog,
            client,
            layer_pattern: config.layer_pattern.clone(),
            lod: config.lod,
            concurrency: config.fetch_concurrency.max(1),
        })
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    fn run_context(&self) -> RunContext {
        let reader = Arc::new(ArchiveReader::with_client(self.client.clone()));
        RunContext {
            locator: RemoteLocator::new(self.catalog.clone(), &self.layer_pattern),
            fetcher: CellFetcher::new(reader, self.lod),
        }
    }

    /// Run one extraction for `aoi`.
    ///
    /// Catalog failures and fetch failures abort the run. Cells whose file
    /// is absent from the archive contribute nothing.
    #[instrument(skip_all, fields(lod = %self.lod))]
    pub async fn extract(&self, aoi: &AreaOfInterest, filter: &AttributeFilter) -> Result<Extraction> {
        let mut run = RunTracker::new();

        run.advance(RunState::Resolving);
        let pairs = CellResolver::new(&self.reference).resolve(aoi);
        if pairs.is_empty() {
            info!("No grid cell with a current dataset intersects the area of interest");
            run.advance(RunState::Empty);
            metrics::counter!("bldg_extractions_total", "outcome" => "no_coverage").increment(1);
            return Ok(Extraction::Empty(EmptyReason::NoCoverage));
        }

        let context = self.run_context();
        let mut paths = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            paths.push(context.locator.locate(pair).await?);
        }
        info!(
            cells = pairs.len(),
            resources = context.locator.resolved_count(),
            "Resolved cell files"
        );

        run.advance(RunState::Fetching);
        // buffered() yields in input order whatever the completion order
        let cells: Vec<CellData> = stream::iter(paths.iter().map(|path| context.fetcher.fetch(path)))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        run.advance(RunState::Merging);
        let not_surveyed = cells.iter().filter(|c| !c.is_surveyed()).count();
        let merged = merge(cells.into_iter().map(CellData::into_collection));
        info!(
            features = merged.len(),
            not_surveyed,
            "Merged cell collections"
        );

        run.advance(RunState::Filtering);
        let clipped = SpatialClipper::new(aoi).clip(&merged);
        let filtered = filter.apply(&clipped);

        if filtered.is_empty() {
            info!(
                merged = merged.len(),
                clipped = clipped.len(),
                "No building matched the area and filters"
            );
            run.advance(RunState::Empty);
            metrics::counter!("bldg_extractions_total", "outcome" => "no_features").increment(1);
            return Ok(Extraction::Empty(EmptyReason::NoFeatures));
        }

        info!(features = filtered.len(), "Extraction ready");
        run.advance(RunState::Ready);
        metrics::counter!("bldg_extractions_total", "outcome" => "ready").increment(1);
        Ok(Extraction::Ready(filtered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_names() {
        assert_eq!(RunState::Idle.to_string(), "idle");
        assert_eq!(RunState::Exporting.to_string(), "exporting");
    }

    #[test]
    fn test_tracker_advances() {
        let mut run = RunTracker::new();
        run.advance(RunState::Resolving);
        run.advance(RunState::Empty);
        assert_eq!(run.state, RunState::Empty);
    }

    #[tokio::test]
    async fn test_empty_extraction_cannot_export() {
        let extraction = Extraction::Empty(EmptyReason::NoFeatures);
        assert!(extraction.is_empty());
        assert_eq!(extraction.len(), 0);
        let result = extraction.export(&Exporter::new(), Encoding::GeoJson).await;
        assert!(matches!(result, Err(ExtractError::NothingToExport(_))));
    }
}
