//! Error types for the shared building model.

use thiserror::Error;

/// Result type alias using BldgError.
pub type BldgResult<T> = Result<T, BldgError>;

/// Errors raised while building or validating shared model values.
#[derive(Debug, Error)]
pub enum BldgError {
    #[error("Invalid mesh code '{code}': {message}")]
    InvalidMeshCode { code: String, message: String },

    #[error("Duplicate grid cell code: {0}")]
    DuplicateCellCode(String),

    #[error("Invalid area of interest: {0}")]
    InvalidAoi(String),

    #[error("Unknown LOD template: {0}")]
    UnknownLod(String),

    #[error("Invalid GeoJSON: {0}")]
    GeoJson(String),
}

impl BldgError {
    /// Create an InvalidMeshCode error.
    pub fn invalid_mesh_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidMeshCode {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidAoi error.
    pub fn invalid_aoi(msg: impl Into<String>) -> Self {
        Self::InvalidAoi(msg.into())
    }
}

impl From<geojson::Error> for BldgError {
    fn from(err: geojson::Error) -> Self {
        BldgError::GeoJson(err.to_string())
    }
}
