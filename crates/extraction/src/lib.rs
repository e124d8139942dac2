//! Building footprint extraction for an area of interest.
//!
//! A run resolves the grid cells under the AOI, maps them to the current
//! municipality datasets, looks each dataset resource up in the catalog,
//! reads the per-cell CityGML file out of the remote archive, then merges,
//! clips and filters the buildings:
//!
//! ```text
//! AOI -> CellResolver -> RemoteLocator -> CellFetcher (per cell)
//!     -> merge -> SpatialClipper -> AttributeFilter -> Exporter
//! ```
//!
//! Reference data (grid, registry, code table) is loaded once and shared
//! read-only between runs.

pub mod clip;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod locator;
pub mod merge;
pub mod pipeline;
pub mod reference;
pub mod resolver;

pub use clip::SpatialClipper;
pub use config::{ExtractorConfig, DEFAULT_CATALOG_BASE_URL, DEFAULT_LAYER_PATTERN};
pub use error::{ExtractError, Result};
pub use fetcher::{CellData, CellFetcher};
pub use filter::{AttributeFilter, HeightRange, MAX_HEIGHT, MIN_HEIGHT};
pub use locator::{compose_path, CatalogClient, CkanCatalog, RemoteLocator};
pub use merge::merge;
pub use pipeline::{EmptyReason, Extraction, Extractor, RunState};
pub use reference::{
    CatalogRegistry, DatasetEntry, GridCell, GridIndex, MeshMunicipalityMap, ReferenceData,
};
pub use resolver::{CellResolver, CellResource};
