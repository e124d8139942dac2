//! Level-of-detail attribute templates.
//!
//! A template fixes, for one run, which geometry properties of a
//! `bldg:Building` are projected and which attributes become columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BldgError;
use crate::feature::{FieldType, Schema, BUILDING_ID, GML_ID, MEASURED_HEIGHT};

/// An attribute column projected from a CityGML element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Column name, also the element local name.
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn spec(name: &'static str, field_type: FieldType) -> AttributeSpec {
    AttributeSpec { name, field_type }
}

const BUILDING_ATTRIBUTES: &[AttributeSpec] = &[
    spec("class", FieldType::Text),
    spec("usage", FieldType::Text),
    spec("yearOfConstruction", FieldType::Integer),
    spec(MEASURED_HEIGHT, FieldType::Real),
    spec("storeysAboveGround", FieldType::Integer),
    spec("storeysBelowGround", FieldType::Integer),
    spec(BUILDING_ID, FieldType::Text),
    spec("branchID", FieldType::Integer),
    spec("partID", FieldType::Integer),
    spec("prefecture", FieldType::Text),
    spec("city", FieldType::Text),
    spec("surveyYear", FieldType::Integer),
];

/// Vertical LOD template, chosen once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LodTemplate {
    #[default]
    #[serde(rename = "LOD1", alias = "lod1")]
    Lod1,
    #[serde(rename = "LOD2", alias = "lod2")]
    Lod2,
}

impl LodTemplate {
    /// Geometry property elements whose surfaces form the feature geometry.
    pub fn geometry_elements(&self) -> &'static [&'static str] {
        match self {
            LodTemplate::Lod1 => &["lod1Solid"],
            LodTemplate::Lod2 => &["lod2Solid", "lod2MultiSurface"],
        }
    }

    /// Attribute columns projected by this template.
    pub fn attributes(&self) -> &'static [AttributeSpec] {
        BUILDING_ATTRIBUTES
    }

    /// Look up an attribute spec by element local name.
    pub fn attribute(&self, local_name: &str) -> Option<&'static AttributeSpec> {
        self.attributes().iter().find(|a| a.name == local_name)
    }

    /// Schema of collections produced with this template.
    pub fn schema(&self) -> Schema {
        self.attributes()
            .iter()
            .fold(Schema::new().with_field(GML_ID, FieldType::Text), |s, a| {
                s.with_field(a.name, a.field_type)
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LodTemplate::Lod1 => "LOD1",
            LodTemplate::Lod2 => "LOD2",
        }
    }
}

impl FromStr for LodTemplate {
    type Err = BldgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOD1" | "1" => Ok(LodTemplate::Lod1),
            "LOD2" | "2" => Ok(LodTemplate::Lod2),
            _ => Err(BldgError::UnknownLod(s.to_string())),
        }
    }
}

impl fmt::Display for LodTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
