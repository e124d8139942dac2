//! Concatenation of per-cell collections.

use bldg_common::{FeatureCollection, Schema};

/// Merge collections in order into one with the union of their schemas.
///
/// Features keep input order (cell order, then order within the cell).
/// Attributes a feature lacks stay absent and export as null.
pub fn merge<I>(collections: I) -> FeatureCollection
where
    I: IntoIterator<Item = FeatureCollection>,
{
    let mut schema = Schema::new();
    let mut features = Vec::new();
    for collection in collections {
        let (cell_schema, cell_features) = collection.into_parts();
        schema = schema.union(&cell_schema);
        features.extend(cell_features);
    }
    FeatureCollection::from_parts(schema, features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bldg_common::{Feature, FieldType};
    use geo::MultiPolygon;

    fn collection(schema: Schema, ids: &[&str]) -> FeatureCollection {
        FeatureCollection::from_parts(
            schema,
            ids.iter()
                .map(|id| Feature::new(MultiPolygon(vec![])).with_attribute("gml_id", *id))
                .collect(),
        )
    }

    #[test]
    fn test_merge_preserves_order() {
        let schema = Schema::new().with_field("gml_id", FieldType::Text);
        let merged = merge(vec![
            collection(schema.clone(), &["a", "b"]),
            collection(schema.clone(), &[]),
            collection(schema, &["c"]),
        ]);
        let ids: Vec<_> = merged.iter().filter_map(|f| f.gml_id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_unions_schemas() {
        let left = Schema::new()
            .with_field("gml_id", FieldType::Text)
            .with_field("measuredHeight", FieldType::Real);
        let right = Schema::new()
            .with_field("gml_id", FieldType::Text)
            .with_field("usage", FieldType::Text);

        let merged = merge(vec![collection(left, &["a"]), collection(right, &["b"])]);
        let names: Vec<_> = merged.schema().names().collect();
        assert_eq!(names, vec!["gml_id", "measuredHeight", "usage"]);
        assert!(merged.features()[0].attribute("usage").is_none());
    }

    #[test]
    fn test_merge_nothing() {
        let merged = merge(Vec::new());
        assert!(merged.is_empty());
        assert!(merged.schema().is_empty());
    }

    #[test]
    fn test_merge_is_associative() {
        let schema = Schema::new().with_field("gml_id", FieldType::Text);
        let c1 = collection(schema.clone(), &["a"]);
        let c2 = collection(schema.clone().with_field("usage", FieldType::Text), &["b"]);
        let c3 = collection(schema.with_field("class", FieldType::Text), &["c"]);

        let staged = merge(vec![merge(vec![c1.clone(), c2.clone()]), c3.clone()]);
        let direct = merge(vec![c1, c2, c3]);
        assert_eq!(staged, direct);
    }
}
