//! GeoParquet 1.0 encoding.
//!
//! Attributes become nullable Int64/Float64/Utf8 columns in schema order,
//! followed by a WKB `geometry` column. The `geo` key-value metadata
//! declares the geometry column, its CRS and the collection bbox.

use std::fs::File;
use std::sync::Arc;

use arrow_array::{ArrayRef, BinaryArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field as ArrowField, Schema as ArrowSchema};
use bldg_common::{FeatureCollection, Field, FieldType};
use geo::{Geometry, MultiPolygon};
use geozero::{CoordDimensions, ToWkb};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::json;
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::EXPORT_SRS_ID;

pub const GEOMETRY_COLUMN: &str = "geometry";

const GEOPARQUET_VERSION: &str = "1.0.0";

/// PROJJSON for JGD2011 geographic 2D.
fn projjson() -> serde_json::Value {
    json!({
        "$schema": "https://proj.org/schemas/v0.7/projjson.schema.json",
        "type": "GeographicCRS",
        "name": "JGD2011",
        "datum": {
            "type": "GeodeticReferenceFrame",
            "name": "Japanese Geodetic Datum 2011",
            "ellipsoid": {
                "name": "GRS 1980",
                "semi_major_axis": 6378137,
                "inverse_flattening": 298.257222101
            }
        },
        "coordinate_system": {
            "subtype": "ellipsoidal",
            "axis": [
                {"name": "Geodetic latitude", "abbreviation": "Lat", "direction": "north", "unit": "degree"},
                {"name": "Geodetic longitude", "abbreviation": "Lon", "direction": "east", "unit": "degree"}
            ]
        },
        "id": {"authority": "EPSG", "code": EXPORT_SRS_ID}
    })
}

/// The `geo` file metadata document.
pub(crate) fn geo_metadata(collection: &FeatureCollection) -> serde_json::Value {
    let mut column = json!({
        "encoding": "WKB",
        "geometry_types": ["MultiPolygon"],
        "crs": projjson(),
    });
    if let Some(rect) = collection.bounds() {
        column["bbox"] = json!([rect.min().x, rect.min().y, rect.max().x, rect.max().y]);
    }

    json!({
        "version": GEOPARQUET_VERSION,
        "primary_column": GEOMETRY_COLUMN,
        "columns": { GEOMETRY_COLUMN: column },
    })
}

fn arrow_type(field_type: FieldType) -> DataType {
    match field_type {
        FieldType::Integer => DataType::Int64,
        FieldType::Real => DataType::Float64,
        FieldType::Text => DataType::Utf8,
    }
}

fn attribute_column(collection: &FeatureCollection, field: &Field) -> ArrayRef {
    let values = collection.iter().map(|f| f.attribute(&field.name));
    match field.field_type {
        FieldType::Integer => Arc::new(values.map(|v| v.and_then(|v| v.as_i64())).collect::<Int64Array>()),
        FieldType::Real => Arc::new(values.map(|v| v.and_then(|v| v.as_f64())).collect::<Float64Array>()),
        FieldType::Text => Arc::new(values.map(|v| v.map(|v| v.to_string())).collect::<StringArray>()),
    }
}

fn to_wkb(geometry: &MultiPolygon<f64>) -> Result<Vec<u8>> {
    Ok(Geometry::MultiPolygon(geometry.clone()).to_wkb(CoordDimensions::xy())?)
}

/// Build the single record batch holding `collection`.
pub(crate) fn record_batch(collection: &FeatureCollection) -> Result<RecordBatch> {
    if collection.schema().contains(GEOMETRY_COLUMN) {
        return Err(ExportError::GeoParquet(format!(
            "attribute '{GEOMETRY_COLUMN}' collides with the geometry column"
        )));
    }
    let fields = collection.schema().fields();

    let mut arrow_fields: Vec<ArrowField> = fields
        .iter()
        .map(|f| ArrowField::new(f.name.as_str(), arrow_type(f.field_type), true))
        .collect();
    arrow_fields.push(ArrowField::new(GEOMETRY_COLUMN, DataType::Binary, false));

    let mut columns: Vec<ArrayRef> = fields
        .iter()
        .map(|f| attribute_column(collection, f))
        .collect();

    let geometries = collection
        .iter()
        .map(|f| to_wkb(&f.geometry))
        .collect::<Result<Vec<Vec<u8>>>>()?;
    columns.push(Arc::new(BinaryArray::from_iter_values(geometries.iter())));

    let schema = Arc::new(ArrowSchema::new(arrow_fields));
    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Write `collection` as GeoParquet into `file`.
pub(crate) fn write_geoparquet(collection: &FeatureCollection, file: File) -> Result<()> {
    let batch = record_batch(collection)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![KeyValue::new(
            "geo".to_string(),
            geo_metadata(collection).to_string(),
        )]))
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    debug!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "Wrote GeoParquet"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::Array;
    use bldg_common::{Feature, Schema, GML_ID};
    use geo::polygon;
    use geozero::wkb::Wkb;
    use geozero::ToGeo;

    fn collection() -> FeatureCollection {
        let schema = Schema::new()
            .with_field(GML_ID, FieldType::Text)
            .with_field("storeysAboveGround", FieldType::Integer);
        let square = polygon![(x: 139.0, y: 35.0), (x: 139.1, y: 35.0), (x: 139.1, y: 35.1)];
        FeatureCollection::from_parts(
            schema,
            vec![
                Feature::new(MultiPolygon(vec![square])).with_attribute(GML_ID, "b1"),
                Feature::new(MultiPolygon(vec![]))
                    .with_attribute(GML_ID, "b2")
                    .with_attribute("storeysAboveGround", 3i64),
            ],
        )
    }

    #[test]
    fn test_record_batch_layout() {
        let batch = record_batch(&collection()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);
        assert_eq!(batch.schema().field(2).name(), GEOMETRY_COLUMN);

        let storeys = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert!(storeys.is_null(0));
        assert_eq!(storeys.value(1), 3);
    }

    #[test]
    fn test_geometry_column_decodes() {
        let source = collection();
        let batch = record_batch(&source).unwrap();
        let wkb = batch
            .column(2)
            .as_any()
            .downcast_ref::<BinaryArray>()
            .unwrap();

        let decoded = Wkb(wkb.value(0).to_vec()).to_geo().unwrap();
        assert_eq!(decoded, Geometry::MultiPolygon(source.features()[0].geometry.clone()));
    }

    #[test]
    fn test_geometry_attribute_is_rejected() {
        let mut source = collection();
        source.push(Feature::new(MultiPolygon(vec![])).with_attribute(GEOMETRY_COLUMN, "x"));
        assert!(matches!(record_batch(&source), Err(ExportError::GeoParquet(_))));
    }

    #[test]
    fn test_geo_metadata() {
        let meta = geo_metadata(&collection());
        assert_eq!(meta["version"], "1.0.0");
        assert_eq!(meta["primary_column"], "geometry");
        assert_eq!(meta["columns"]["geometry"]["encoding"], "WKB");
        assert_eq!(meta["columns"]["geometry"]["crs"]["id"]["code"], 6668);
        assert_eq!(meta["columns"]["geometry"]["bbox"][0], 139.0);
    }
}
