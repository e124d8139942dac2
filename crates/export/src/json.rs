//! GeoJSON encoding.

use bldg_common::{FeatureCollection, GML_ID};
use geojson::{Feature, Geometry, JsonObject, JsonValue, Value};

use crate::error::{ExportError, Result};

/// Encode `collection` as a GeoJSON FeatureCollection.
///
/// Every feature carries every schema field; attributes a feature lacks are
/// written as `null`. The `gml_id` doubles as the feature id.
pub fn to_geojson(collection: &FeatureCollection) -> Result<Vec<u8>> {
    let schema = collection.schema();

    let features = collection
        .iter()
        .map(|feature| {
            let mut properties = JsonObject::new();
            for name in schema.names() {
                let value = feature
                    .attribute(name)
                    .map(|v| v.to_json())
                    .unwrap_or(JsonValue::Null);
                properties.insert(name.to_string(), value);
            }

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::from(&feature.geometry))),
                id: feature
                    .attribute(GML_ID)
                    .and_then(|v| v.as_str())
                    .map(|id| geojson::feature::Id::String(id.to_string())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    serde_json::to_vec(&fc).map_err(|e| ExportError::GeoJson(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bldg_common::{Feature as BldgFeature, FieldType, Schema};
    use geo::{polygon, MultiPolygon};

    #[test]
    fn test_missing_attribute_is_null() {
        let schema = Schema::new()
            .with_field(GML_ID, FieldType::Text)
            .with_field("measuredHeight", FieldType::Real);
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let feature = BldgFeature::new(MultiPolygon(vec![square])).with_attribute(GML_ID, "b1");
        let fc = FeatureCollection::from_parts(schema, vec![feature]);

        let text = String::from_utf8(to_geojson(&fc).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        let first = &value["features"][0];
        assert_eq!(first["id"], "b1");
        assert!(first["properties"]["measuredHeight"].is_null());
        assert_eq!(first["geometry"]["type"], "MultiPolygon");
    }
}
