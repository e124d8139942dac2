//! CityGML building parser.
//!
//! Reads `bldg:Building` members from a CityGML 2.0 document and projects
//! them through a [`LodTemplate`](bldg_common::LodTemplate) into a
//! [`FeatureCollection`](bldg_common::FeatureCollection).
//!
//! Positions are read as `lat lon [height]` (EPSG:6697 axis order) and
//! emitted as 2D `(lon, lat)` coordinates.

pub mod error;
mod geometry;
mod parser;

pub use error::{CityGmlError, Result};
pub use parser::CityGmlParser;
