//! Building feature model.
//!
//! A [`FeatureCollection`] carries an ordered list of features together with
//! the attribute schema that describes them. Attributes missing from a
//! feature are treated as null; the schema is the authority on which columns
//! exist and in what order they are written.

use std::collections::BTreeMap;
use std::fmt;

use geo::{BoundingRect, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

/// GML object identifier attribute.
pub const GML_ID: &str = "gml_id";

/// Building identifier attribute (`uro:buildingID`).
pub const BUILDING_ID: &str = "buildingID";

/// Measured building height attribute (`bldg:measuredHeight`), in metres.
pub const MEASURED_HEIGHT: &str = "measuredHeight";

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    /// The schema type this value belongs to.
    pub fn field_type(&self) -> FieldType {
        match self {
            AttributeValue::Integer(_) => FieldType::Integer,
            AttributeValue::Real(_) => FieldType::Real,
            AttributeValue::Text(_) => FieldType::Text,
        }
    }

    /// Borrow the value as text, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. Text is never coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Real(v) => Some(*v),
            AttributeValue::Text(_) => None,
        }
    }

    /// Integer view of the value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::Integer(v) => serde_json::Value::from(*v),
            AttributeValue::Real(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttributeValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Parse raw text into a value of the requested type.
    ///
    /// Returns `None` when the text does not parse as that type.
    pub fn parse_as(text: &str, field_type: FieldType) -> Option<Self> {
        let text = text.trim();
        match field_type {
            FieldType::Text => Some(AttributeValue::Text(text.to_string())),
            FieldType::Integer => text.parse().ok().map(AttributeValue::Integer),
            FieldType::Real => text.parse().ok().map(AttributeValue::Real),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Integer(v) => write!(f, "{v}"),
            AttributeValue::Real(v) => write!(f, "{v}"),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Real(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

/// Column type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Real,
    Text,
}

impl FieldType {
    /// Smallest type able to hold values of both `self` and `other`.
    pub fn widen(self, other: FieldType) -> FieldType {
        match (self, other) {
            (a, b) if a == b => a,
            (FieldType::Integer, FieldType::Real) | (FieldType::Real, FieldType::Integer) => {
                FieldType::Real
            }
            _ => FieldType::Text,
        }
    }
}

/// A named, typed attribute column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered attribute schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field addition.
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.merge_field(Field::new(name, field_type));
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add a field, widening its type if a field of that name exists.
    ///
    /// New fields are appended, so field order is first-seen order.
    pub fn merge_field(&mut self, field: Field) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => existing.field_type = existing.field_type.widen(field.field_type),
            None => self.fields.push(field),
        }
    }

    /// Union of two schemas. Fields of `self` come first.
    pub fn union(&self, other: &Schema) -> Schema {
        let mut merged = self.clone();
        for field in &other.fields {
            merged.merge_field(field.clone());
        }
        merged
    }

    /// Field names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// One building record: footprint geometry plus attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: MultiPolygon<f64>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Feature {
    /// Create a feature with no attributes.
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Self {
            geometry,
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute value.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn gml_id(&self) -> Option<&str> {
        self.attribute(GML_ID).and_then(AttributeValue::as_str)
    }

    pub fn building_id(&self) -> Option<&str> {
        self.attribute(BUILDING_ID).and_then(AttributeValue::as_str)
    }

    pub fn measured_height(&self) -> Option<f64> {
        self.attribute(MEASURED_HEIGHT).and_then(AttributeValue::as_f64)
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

/// Ordered collection of features with a unioned schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    schema: Schema,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create an empty collection with the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            features: Vec::new(),
        }
    }

    /// Create a collection from a schema and features.
    ///
    /// Attributes present on features but absent from the schema are
    /// appended to it.
    pub fn from_parts(schema: Schema, features: Vec<Feature>) -> Self {
        let mut collection = Self::new(schema);
        for feature in features {
            collection.push(feature);
        }
        collection
    }

    /// Append a feature, extending the schema with any new attributes.
    pub fn push(&mut self, feature: Feature) {
        for (name, value) in &feature.attributes {
            self.schema
                .merge_field(Field::new(name.clone(), value.field_type()));
        }
        self.features.push(feature);
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn into_parts(self) -> (Schema, Vec<Feature>) {
        (self.schema, self.features)
    }

    /// New collection holding the features matching `predicate`.
    ///
    /// Relative order and the schema are preserved; `self` is untouched.
    pub fn filtered<P>(&self, mut predicate: P) -> FeatureCollection
    where
        P: FnMut(&Feature) -> bool,
    {
        FeatureCollection {
            schema: self.schema.clone(),
            features: self.features.iter().filter(|f| predicate(f)).cloned().collect(),
        }
    }

    /// Building identifiers of all features that carry one.
    pub fn building_ids(&self) -> Vec<&str> {
        self.features.iter().filter_map(Feature::building_id).collect()
    }

    /// Combined bounding rectangle of every feature geometry.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(Feature::bounding_rect)
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]])
    }

    #[test]
    fn test_widen_types() {
        assert_eq!(FieldType::Integer.widen(FieldType::Real), FieldType::Real);
        assert_eq!(FieldType::Real.widen(FieldType::Real), FieldType::Real);
        assert_eq!(FieldType::Integer.widen(FieldType::Text), FieldType::Text);
    }

    #[test]
    fn test_push_extends_schema() {
        let mut fc = FeatureCollection::new(Schema::new().with_field(BUILDING_ID, FieldType::Text));
        fc.push(
            Feature::new(square())
                .with_attribute(BUILDING_ID, "13101-bldg-1")
                .with_attribute(MEASURED_HEIGHT, 12.5),
        );
        let names: Vec<_> = fc.schema().names().collect();
        assert_eq!(names, vec![BUILDING_ID, MEASURED_HEIGHT]);
    }

    #[test]
    fn test_typed_accessors() {
        let f = Feature::new(square())
            .with_attribute(BUILDING_ID, "13101-bldg-1")
            .with_attribute(MEASURED_HEIGHT, 7_i64);
        assert_eq!(f.building_id(), Some("13101-bldg-1"));
        assert_eq!(f.measured_height(), Some(7.0));

        let text_height = Feature::new(square()).with_attribute(MEASURED_HEIGHT, "7.0");
        assert_eq!(text_height.measured_height(), None);
    }

    #[test]
    fn test_filtered_does_not_mutate_source() {
        let fc = FeatureCollection::from_parts(
            Schema::new(),
            vec![
                Feature::new(square()).with_attribute(BUILDING_ID, "a"),
                Feature::new(square()).with_attribute(BUILDING_ID, "b"),
            ],
        );
        let only_b = fc.filtered(|f| f.building_id() == Some("b"));
        assert_eq!(only_b.building_ids(), vec!["b"]);
        assert_eq!(fc.len(), 2);
        assert_eq!(only_b.schema(), fc.schema());
    }

    #[test]
    fn test_parse_as() {
        assert_eq!(
            AttributeValue::parse_as(" 12.5 ", FieldType::Real),
            Some(AttributeValue::Real(12.5))
        );
        assert_eq!(AttributeValue::parse_as("x", FieldType::Integer), None);
    }
}
