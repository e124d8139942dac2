//! Typed attribute predicates.

use bldg_common::{Feature, FeatureCollection};
use tracing::debug;

use crate::error::{ExtractError, Result};

/// Lower bound of the measured height domain, in metres.
pub const MIN_HEIGHT: f64 = 0.0;

/// Upper bound of the measured height domain, in metres.
pub const MAX_HEIGHT: f64 = 700.0;

/// Inclusive `[min, max]` range on `measuredHeight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightRange {
    min: f64,
    max: f64,
}

impl HeightRange {
    /// The whole domain; filtering with it is a no-op.
    pub const FULL: HeightRange = HeightRange {
        min: MIN_HEIGHT,
        max: MAX_HEIGHT,
    };

    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ExtractError::InvalidFilter(format!(
                "height bounds must be finite, got [{min}, {max}]"
            )));
        }
        if min > max {
            return Err(ExtractError::InvalidFilter(format!(
                "height minimum {min} exceeds maximum {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }

    pub fn contains(&self, height: f64) -> bool {
        self.min <= height && height <= self.max
    }
}

impl Default for HeightRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Identifier and height predicates, applied in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeFilter {
    building_id: Option<String>,
    height: HeightRange,
}

impl AttributeFilter {
    /// A filter that keeps everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact match on `buildingID`. An empty value clears the predicate.
    pub fn with_building_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.building_id = if id.trim().is_empty() { None } else { Some(id) };
        self
    }

    pub fn with_height(mut self, range: HeightRange) -> Self {
        self.height = range;
        self
    }

    pub fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }

    pub fn height(&self) -> HeightRange {
        self.height
    }

    /// Whether applying the filter can never drop a feature.
    pub fn is_noop(&self) -> bool {
        self.building_id.is_none() && self.height.is_full()
    }

    fn matches_id(&self, feature: &Feature) -> bool {
        match &self.building_id {
            Some(id) => feature.building_id() == Some(id.as_str()),
            None => true,
        }
    }

    fn matches_height(&self, feature: &Feature) -> bool {
        if self.height.is_full() {
            return true;
        }
        feature
            .measured_height()
            .is_some_and(|h| self.height.contains(h))
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        self.matches_id(feature) && self.matches_height(feature)
    }

    /// New collection with the matching features, in order.
    pub fn apply(&self, collection: &FeatureCollection) -> FeatureCollection {
        if self.is_noop() {
            return collection.clone();
        }
        let by_id = collection.filtered(|f| self.matches_id(f));
        let filtered = by_id.filtered(|f| self.matches_height(f));
        debug!(
            building_id = self.building_id.as_deref(),
            min_height = self.height.min,
            max_height = self.height.max,
            input = collection.len(),
            retained = filtered.len(),
            "Applied attribute filter"
        );
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bldg_common::MEASURED_HEIGHT;
    use geo::MultiPolygon;

    fn building(id: &str, height: Option<f64>) -> Feature {
        let feature = Feature::new(MultiPolygon(vec![])).with_attribute("buildingID", id);
        match height {
            Some(h) => feature.with_attribute(MEASURED_HEIGHT, h),
            None => feature,
        }
    }

    fn sample() -> FeatureCollection {
        FeatureCollection::from_parts(
            Default::default(),
            vec![
                building("13101-bldg-1", Some(5.0)),
                building("13101-bldg-2", None),
                building("13101-bldg-3", Some(45.0)),
                building("13101-bldg-4", Some(20.0)),
            ],
        )
    }

    fn ids(collection: &FeatureCollection) -> Vec<&str> {
        collection.building_ids()
    }

    #[test]
    fn test_default_filter_keeps_everything() {
        let filter = AttributeFilter::new();
        assert!(filter.is_noop());
        assert_eq!(filter.apply(&sample()).len(), 4);
    }

    #[test]
    fn test_explicit_full_range_keeps_missing_heights() {
        let filter = AttributeFilter::new().with_height(HeightRange::new(0.0, 700.0).unwrap());
        assert!(filter.is_noop());
        assert_eq!(filter.apply(&sample()).len(), 4);
    }

    #[test]
    fn test_height_range_is_inclusive() {
        let filter = AttributeFilter::new().with_height(HeightRange::new(5.0, 20.0).unwrap());
        let out = filter.apply(&sample());
        assert_eq!(ids(&out), vec!["13101-bldg-1", "13101-bldg-4"]);
        for f in out.iter() {
            let h = f.measured_height().unwrap();
            assert!((5.0..=20.0).contains(&h));
        }
    }

    #[test]
    fn test_missing_height_excluded_under_narrowed_range() {
        let filter = AttributeFilter::new().with_height(HeightRange::new(0.0, 699.0).unwrap());
        let out = filter.apply(&sample());
        assert!(!ids(&out).contains(&"13101-bldg-2"));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_building_id_exact_match() {
        let filter = AttributeFilter::new().with_building_id("13101-bldg-3");
        assert_eq!(ids(&filter.apply(&sample())), vec!["13101-bldg-3"]);

        let filter = AttributeFilter::new().with_building_id("13101-bldg");
        assert!(filter.apply(&sample()).is_empty());
    }

    #[test]
    fn test_empty_building_id_means_no_filter() {
        let filter = AttributeFilter::new().with_building_id("");
        assert_eq!(filter.building_id(), None);
        assert_eq!(filter.apply(&sample()).len(), 4);
    }

    #[test]
    fn test_predicates_compose() {
        let filter = AttributeFilter::new()
            .with_building_id("13101-bldg-3")
            .with_height(HeightRange::new(0.0, 10.0).unwrap());
        assert!(filter.apply(&sample()).is_empty());
    }

    #[test]
    fn test_source_collection_is_untouched() {
        let source = sample();
        let before = source.clone();
        let _ = AttributeFilter::new().with_building_id("13101-bldg-1").apply(&source);
        assert_eq!(source, before);
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            HeightRange::new(10.0, 5.0),
            Err(ExtractError::InvalidFilter(_))
        ));
        assert!(HeightRange::new(f64::NAN, 5.0).is_err());
        assert!(HeightRange::new(3.0, 3.0).is_ok());
    }
}
