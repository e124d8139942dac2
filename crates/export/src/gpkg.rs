//! GeoPackage 1.3 encoding through SQLite.

use std::path::Path;

use bldg_common::{AttributeValue, FeatureCollection, FieldType};
use chrono::Utc;
use geo::{BoundingRect, Geometry, MultiPolygon};
use geozero::{CoordDimensions, ToWkb};
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, Sqlite, SqliteConnection};
use tracing::debug;

use crate::error::Result;
use crate::EXPORT_SRS_ID;

/// Layer (table) name of the exported features.
pub const LAYER_NAME: &str = "bldg";

const GEOMETRY_COLUMN: &str = "geom";

/// "GPKG"
const APPLICATION_ID: i64 = 0x4750_4B47;
const USER_VERSION: i64 = 10300;

const SCHEMA_SQL: &str = r#"
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);

CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL,
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);

CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
)
"#;

const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]"#;

const JGD2011_WKT: &str = r#"GEOGCS["JGD2011",DATUM["Japanese_Geodetic_Datum_2011",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","1128"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","6668"]]"#;

/// (srs_name, srs_id, organization, organization_coordsys_id, definition)
const SPATIAL_REF_SYS: [(&str, i64, &str, i64, &str); 4] = [
    ("Undefined cartesian SRS", -1, "NONE", -1, "undefined"),
    ("Undefined geographic SRS", 0, "NONE", 0, "undefined"),
    ("WGS 84 geodetic", 4326, "EPSG", 4326, WGS84_WKT),
    ("JGD2011", 6668, "EPSG", 6668, JGD2011_WKT),
];

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Integer => "INTEGER",
        FieldType::Real => "DOUBLE",
        FieldType::Text => "TEXT",
    }
}

/// GeoPackage binary geometry: header, `[minx, maxx, miny, maxy]`
/// envelope, then WKB. Empty geometries carry no envelope.
pub(crate) fn geometry_blob(geometry: &MultiPolygon<f64>, srs_id: i32) -> Result<Vec<u8>> {
    let envelope = geometry
        .bounding_rect()
        .map(|r| vec![r.min().x, r.max().x, r.min().y, r.max().y])
        .unwrap_or_default();
    let blob = Geometry::MultiPolygon(geometry.clone()).to_gpkg_wkb(
        CoordDimensions::xy(),
        Some(srs_id),
        envelope,
    )?;
    Ok(blob)
}

type InsertQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_value<'q>(
    query: InsertQuery<'q>,
    value: Option<&AttributeValue>,
    field_type: FieldType,
) -> InsertQuery<'q> {
    match (value, field_type) {
        (None, _) => query.bind(None::<String>),
        (Some(AttributeValue::Integer(v)), FieldType::Integer) => query.bind(*v),
        (Some(v), FieldType::Real) => query.bind(v.as_f64()),
        (Some(v), _) => query.bind(v.to_string()),
    }
}

/// Write `collection` as a GeoPackage at `path`.
///
/// The file at `path` must be empty or absent. The connection is closed
/// before returning on every path, so no journal file outlives the call.
pub(crate) async fn write_geopackage(collection: &FeatureCollection, path: &Path) -> Result<()> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let mut conn = SqliteConnection::connect_with(&options).await?;

    let written = populate(&mut conn, collection).await;
    conn.close().await?;
    written?;

    debug!(
        path = %path.display(),
        features = collection.len(),
        columns = collection.schema().len(),
        "Wrote GeoPackage"
    );
    Ok(())
}

async fn populate(conn: &mut SqliteConnection, collection: &FeatureCollection) -> Result<()> {
    sqlx::query(&format!("PRAGMA application_id = {APPLICATION_ID}"))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!("PRAGMA user_version = {USER_VERSION}"))
        .execute(&mut *conn)
        .await?;

    let mut tx = conn.begin().await?;

    for statement in SCHEMA_SQL.split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(&mut *tx).await?;
        }
    }

    for (name, id, org, org_id, definition) in SPATIAL_REF_SYS {
        sqlx::query(
            "INSERT INTO gpkg_spatial_ref_sys \
             (srs_name, srs_id, organization, organization_coordsys_id, definition) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(id)
        .bind(org)
        .bind(org_id)
        .bind(definition)
        .execute(&mut *tx)
        .await?;
    }

    let fields = collection.schema().fields();
    let mut columns = vec![
        "fid INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string(),
        format!("{GEOMETRY_COLUMN} MULTIPOLYGON"),
    ];
    columns.extend(
        fields
            .iter()
            .map(|f| format!("{} {}", quote_ident(&f.name), column_type(f.field_type))),
    );
    sqlx::query(&format!(
        "CREATE TABLE {} ({})",
        quote_ident(LAYER_NAME),
        columns.join(", ")
    ))
    .execute(&mut *tx)
    .await?;

    let bounds = collection.bounds();
    sqlx::query(
        "INSERT INTO gpkg_contents \
         (table_name, data_type, identifier, description, last_change, min_x, min_y, max_x, max_y, srs_id) \
         VALUES (?, 'features', ?, '', ?, ?, ?, ?, ?, ?)",
    )
    .bind(LAYER_NAME)
    .bind(LAYER_NAME)
    .bind(Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
    .bind(bounds.map(|r| r.min().x))
    .bind(bounds.map(|r| r.min().y))
    .bind(bounds.map(|r| r.max().x))
    .bind(bounds.map(|r| r.max().y))
    .bind(EXPORT_SRS_ID)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO gpkg_geometry_columns \
         (table_name, column_name, geometry_type_name, srs_id, z, m) \
         VALUES (?, ?, 'MULTIPOLYGON', ?, 0, 0)",
    )
    .bind(LAYER_NAME)
    .bind(GEOMETRY_COLUMN)
    .bind(EXPORT_SRS_ID)
    .execute(&mut *tx)
    .await?;

    let mut column_names = vec![GEOMETRY_COLUMN.to_string()];
    column_names.extend(fields.iter().map(|f| quote_ident(&f.name)));
    let placeholders = vec!["?"; column_names.len()].join(", ");
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(LAYER_NAME),
        column_names.join(", "),
        placeholders
    );

    for feature in collection.iter() {
        let blob = geometry_blob(&feature.geometry, EXPORT_SRS_ID)?;
        let mut query = sqlx::query(&insert).bind(blob);
        for field in fields {
            query = bind_value(query, feature.attribute(&field.name), field.field_type);
        }
        query.execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}
