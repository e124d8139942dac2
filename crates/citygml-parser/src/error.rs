//! Error types for CityGML parsing.

use thiserror::Error;

/// Errors that can occur while parsing a CityGML document.
#[derive(Error, Debug)]
pub enum CityGmlError {
    #[error("XML error at byte {position}: {message}")]
    Xml { position: usize, message: String },

    #[error("Invalid geometry in {element}: {message}")]
    Geometry { element: String, message: String },

    #[error("Document ended inside an open building")]
    Truncated,
}

impl CityGmlError {
    /// Create a Geometry error.
    pub fn geometry(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Geometry {
            element: element.into(),
            message: message.into(),
        }
    }
}

/// Result type for CityGML parsing.
pub type Result<T> = std::result::Result<T, CityGmlError>;
