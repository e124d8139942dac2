//! Error types for exports.

use thiserror::Error;

/// Errors raised while encoding a feature collection.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unknown export encoding '{0}'")]
    UnknownEncoding(String),

    #[error("GeoJSON encoding failed: {0}")]
    GeoJson(String),

    #[error("GeoPackage encoding failed: {0}")]
    GeoPackage(String),

    #[error("GeoParquet encoding failed: {0}")]
    GeoParquet(String),

    #[error("Geometry encoding failed: {0}")]
    Geometry(String),

    #[error("Scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for ExportError {
    fn from(err: sqlx::Error) -> Self {
        Self::GeoPackage(err.to_string())
    }
}

impl From<geozero::error::GeozeroError> for ExportError {
    fn from(err: geozero::error::GeozeroError) -> Self {
        Self::Geometry(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for ExportError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        Self::GeoParquet(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for ExportError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        Self::GeoParquet(err.to_string())
    }
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
