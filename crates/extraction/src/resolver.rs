//! AOI to (cell, resource) resolution.

use std::collections::HashSet;

use bldg_common::AreaOfInterest;
use tracing::{debug, instrument};

use crate::reference::ReferenceData;

/// One unit of fetch work: a grid cell and the dataset resource covering it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellResource {
    pub cell_code: String,
    pub resource_id: String,
}

impl CellResource {
    pub fn new(cell_code: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            cell_code: cell_code.into(),
            resource_id: resource_id.into(),
        }
    }
}

/// Maps an AOI to the cells and current resources it needs.
pub struct CellResolver<'a> {
    reference: &'a ReferenceData,
}

impl<'a> CellResolver<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// Resolve `aoi` into ordered (cell, resource) pairs.
    ///
    /// Cells come in grid index order; for each cell, municipalities in code
    /// table order; for each municipality, current datasets in registry
    /// order. Repeated pairs keep their first position. An empty result
    /// means the AOI has no coverage.
    #[instrument(skip_all)]
    pub fn resolve(&self, aoi: &AreaOfInterest) -> Vec<CellResource> {
        let cells = self.reference.grid.intersecting(aoi.polygon());

        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for cell in &cells {
            for municipality in self.reference.codes.municipalities_for(&cell.code) {
                for entry in self.reference.registry.current_for(municipality) {
                    let pair = CellResource::new(cell.code.as_str(), entry.resource_id.as_str());
                    if seen.insert(pair.clone()) {
                        pairs.push(pair);
                    }
                }
            }
        }

        debug!(
            cells = cells.len(),
            pairs = pairs.len(),
            "Resolved area of interest"
        );
        pairs
    }
}
