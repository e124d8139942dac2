//! Output encodings and the exported byte payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// Default file stem for downloads.
pub const DEFAULT_FILE_STEM: &str = "plateau_building";

/// Supported output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// RFC 7946 text.
    GeoJson,
    /// GeoPackage container with a single `bldg` layer.
    GeoPackage,
    /// GeoParquet 1.0 columnar file.
    GeoParquet,
}

impl Encoding {
    pub const ALL: [Encoding; 3] = [Encoding::GeoJson, Encoding::GeoPackage, Encoding::GeoParquet];

    pub fn extension(&self) -> &'static str {
        match self {
            Encoding::GeoJson => "geojson",
            Encoding::GeoPackage => "gpkg",
            Encoding::GeoParquet => "parquet",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Encoding::GeoJson => "application/geo+json",
            Encoding::GeoPackage => "application/geopackage+sqlite3",
            Encoding::GeoParquet => "application/vnd.apache.parquet",
        }
    }

    /// Display label, as offered to users.
    pub fn label(&self) -> &'static str {
        match self {
            Encoding::GeoJson => "GeoJSON",
            Encoding::GeoPackage => "GeoPackage",
            Encoding::GeoParquet => "GeoParquet",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Encoding {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geojson" | "json" => Ok(Encoding::GeoJson),
            "geopackage" | "gpkg" => Ok(Encoding::GeoPackage),
            "geoparquet" | "parquet" => Ok(Encoding::GeoParquet),
            _ => Err(ExportError::UnknownEncoding(s.to_string())),
        }
    }
}

/// Encoded bytes plus the metadata needed to hand them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub encoding: Encoding,
    pub bytes: Vec<u8>,
}

impl ExportPayload {
    pub fn new(encoding: Encoding, bytes: Vec<u8>) -> Self {
        Self { encoding, bytes }
    }

    pub fn mime_type(&self) -> &'static str {
        self.encoding.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.encoding.extension()
    }

    /// `<stem>.<ext>`
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_metadata() {
        assert_eq!(Encoding::GeoJson.mime_type(), "application/geo+json");
        assert_eq!(Encoding::GeoPackage.extension(), "gpkg");
        assert_eq!(Encoding::GeoParquet.mime_type(), "application/vnd.apache.parquet");
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("GeoJSON".parse::<Encoding>().unwrap(), Encoding::GeoJson);
        assert_eq!("gpkg".parse::<Encoding>().unwrap(), Encoding::GeoPackage);
        assert_eq!("parquet".parse::<Encoding>().unwrap(), Encoding::GeoParquet);
        assert!("shapefile".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_file_name() {
        let payload = ExportPayload::new(Encoding::GeoPackage, vec![1, 2, 3]);
        assert_eq!(payload.file_name(DEFAULT_FILE_STEM), "plateau_building.gpkg");
        assert_eq!(payload.len(), 3);
    }
}
