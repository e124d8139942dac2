//! Area of interest supplied by the caller of an extraction.

use geo::{Area, BoundingRect, Geometry, Polygon, Rect};
use geojson::GeoJson;

use crate::error::{BldgError, BldgResult};

/// A single polygon bounding an extraction request.
///
/// Immutable once built; the pipeline only ever borrows it.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    polygon: Polygon<f64>,
    bounds: Rect<f64>,
}

impl AreaOfInterest {
    /// Wrap a polygon, rejecting degenerate input.
    pub fn new(polygon: Polygon<f64>) -> BldgResult<Self> {
        if polygon.exterior().0.len() < 4 {
            return Err(BldgError::invalid_aoi(
                "polygon exterior needs at least 4 positions",
            ));
        }
        if polygon.unsigned_area() <= 0.0 {
            return Err(BldgError::invalid_aoi("polygon has zero area"));
        }
        let bounds = polygon
            .bounding_rect()
            .ok_or_else(|| BldgError::invalid_aoi("polygon has no extent"))?;

        Ok(Self { polygon, bounds })
    }

    /// Parse an AOI from GeoJSON text.
    ///
    /// Accepts a Polygon geometry, a Feature, or a FeatureCollection (the
    /// first feature is used). A MultiPolygon with exactly one member is
    /// accepted as that polygon.
    pub fn from_geojson_str(text: &str) -> BldgResult<Self> {
        let geojson: GeoJson = text.parse()?;

        let value = match geojson {
            GeoJson::Geometry(g) => Some(g.value),
            GeoJson::Feature(f) => f.geometry.map(|g| g.value),
            GeoJson::FeatureCollection(fc) => fc
                .features
                .into_iter()
                .next()
                .and_then(|f| f.geometry)
                .map(|g| g.value),
        }
        .ok_or_else(|| BldgError::invalid_aoi("GeoJSON contains no geometry"))?;

        match Geometry::<f64>::try_from(value)? {
            Geometry::Polygon(p) => Self::new(p),
            Geometry::MultiPolygon(mut mp) if mp.0.len() == 1 => Self::new(mp.0.remove(0)),
            other => Err(BldgError::invalid_aoi(format!(
                "expected a single polygon, got {}",
                geometry_name(&other)
            ))),
        }
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Axis-aligned bounds of the AOI.
    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }
}

fn geometry_name(g: &Geometry<f64>) -> &'static str {
    match g {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURE: &str = r#"{
        "type": "Feature",
        "properties": {},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[139.76, 35.67], [139.78, 35.67], [139.78, 35.69], [139.76, 35.69], [139.76, 35.67]]]
        }
    }"#;

    #[test]
    fn test_from_feature() {
        let aoi = AreaOfInterest::from_geojson_str(FEATURE).unwrap();
        let b = aoi.bounds();
        assert_eq!(b.min().x, 139.76);
        assert_eq!(b.max().y, 35.69);
    }

    #[test]
    fn test_from_feature_collection_uses_first() {
        let fc = format!(r#"{{"type": "FeatureCollection", "features": [{}]}}"#, FEATURE);
        assert!(AreaOfInterest::from_geojson_str(&fc).is_ok());
    }

    #[test]
    fn test_rejects_point() {
        let err = AreaOfInterest::from_geojson_str(r#"{"type":"Point","coordinates":[139.0,35.0]}"#)
            .unwrap_err();
        assert!(matches!(err, BldgError::InvalidAoi(_)));
    }

    #[test]
    fn test_rejects_empty_collection() {
        let err = AreaOfInterest::from_geojson_str(r#"{"type":"FeatureCollection","features":[]}"#)
            .unwrap_err();
        assert!(matches!(err, BldgError::InvalidAoi(_)));
    }

    #[test]
    fn test_rejects_zero_area() {
        let flat = r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[2,0],[0,0]]]}"#;
        assert!(AreaOfInterest::from_geojson_str(flat).is_err());
    }
}
