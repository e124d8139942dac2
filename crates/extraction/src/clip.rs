//! Strict containment filter against the AOI.

use bldg_common::{AreaOfInterest, Feature, FeatureCollection};
use geo::{Area, Intersects, Polygon, Relate};
use tracing::debug;

/// Keeps only features lying entirely inside the AOI.
///
/// Geometries are never cut. A feature touching or crossing the AOI
/// boundary from outside is dropped as a whole.
pub struct SpatialClipper<'a> {
    aoi: &'a AreaOfInterest,
}

impl<'a> SpatialClipper<'a> {
    pub fn new(aoi: &'a AreaOfInterest) -> Self {
        Self { aoi }
    }

    /// Whether `feature` is within the AOI.
    ///
    /// Surfaces with area must relate as within. Vertical surfaces
    /// collapse to zero area in 2D; those only need every vertex covered.
    /// A feature without geometry is never within.
    pub fn contains(&self, feature: &Feature) -> bool {
        let aoi = self.aoi.polygon();
        let Some(rect) = feature.bounding_rect() else {
            return false;
        };
        if !aoi.intersects(&rect) {
            return false;
        }

        let mut has_area = false;
        for polygon in &feature.geometry {
            if polygon.unsigned_area() > 0.0 {
                if !polygon.relate(aoi).is_within() {
                    return false;
                }
                has_area = true;
            } else if !vertices_covered(polygon, aoi) {
                return false;
            }
        }
        has_area
    }

    /// New collection with the contained features, in order.
    pub fn clip(&self, collection: &FeatureCollection) -> FeatureCollection {
        let clipped = collection.filtered(|f| self.contains(f));
        debug!(
            input = collection.len(),
            retained = clipped.len(),
            "Clipped to area of interest"
        );
        clipped
    }
}

fn vertices_covered(polygon: &Polygon<f64>, aoi: &Polygon<f64>) -> bool {
    polygon
        .exterior()
        .coords()
        .all(|c| aoi.intersects(c))
}
