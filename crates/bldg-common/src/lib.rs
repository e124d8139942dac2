//! Common types shared across the building extraction crates.
//!
//! The feature model here is the unit of exchange between the CityGML
//! parser, the extraction pipeline and the exporters.

pub mod aoi;
pub mod error;
pub mod feature;
pub mod lod;
pub mod mesh;

pub use aoi::AreaOfInterest;
pub use error::{BldgError, BldgResult};
pub use feature::{
    AttributeValue, Feature, FeatureCollection, Field, FieldType, Schema, BUILDING_ID,
    GML_ID, MEASURED_HEIGHT,
};
pub use lod::{AttributeSpec, LodTemplate};
pub use mesh::MeshCode;
