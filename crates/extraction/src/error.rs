//! Error types for the extraction pipeline.

use bldg_common::BldgError;
use citygml_parser::CityGmlError;
use export::ExportError;
use thiserror::Error;
use vsi_archive::ArchiveError;

/// Errors that abort an extraction run.
///
/// A cell whose file is absent from its archive is not an error; it is
/// reported as `CellData::NotSurveyed`.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Catalog lookup failed for resource {resource}: {message}")]
    CatalogLookup { resource: String, message: String },

    #[error("Failed to fetch {path}: {message}")]
    Fetch { path: String, message: String },

    #[error("Failed to load reference data from {input}: {message}")]
    Reference { input: String, message: String },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Nothing to export: {0}")]
    NothingToExport(String),

    #[error(transparent)]
    Common(#[from] BldgError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ExtractError {
    /// Create a CatalogLookup error.
    pub fn catalog_lookup(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CatalogLookup {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a Fetch error.
    pub fn fetch(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Reference error.
    pub fn reference(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reference {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Wrap an archive read failure for `path`.
    pub fn from_archive(path: impl Into<String>, err: ArchiveError) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {}", err)
        } else {
            err.to_string()
        };
        Self::fetch(path, message)
    }

    /// Wrap a CityGML parse failure for `path`.
    pub fn from_citygml(path: impl Into<String>, err: CityGmlError) -> Self {
        Self::fetch(path, format!("invalid CityGML: {}", err))
    }
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
