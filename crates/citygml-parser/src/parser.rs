//! Event-driven `bldg:Building` extraction.

use std::collections::BTreeMap;

use bldg_common::{
    AttributeSpec, AttributeValue, Feature, FeatureCollection, LodTemplate, GML_ID,
};
use geo::{Coord, MultiPolygon, Polygon};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::{CityGmlError, Result};
use crate::geometry::{decode_positions, PolygonBuilder, RingRole, DEFAULT_DIMENSION};

/// Parses building features out of CityGML documents.
///
/// The template is fixed at construction; every document parsed by one
/// parser yields the same attribute schema.
#[derive(Debug, Clone, Copy)]
pub struct CityGmlParser {
    template: LodTemplate,
}

impl CityGmlParser {
    pub fn new(template: LodTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> LodTemplate {
        self.template
    }

    /// Parse every building in `data`.
    pub fn parse(&self, data: &[u8]) -> Result<FeatureCollection> {
        let mut reader = Reader::from_reader(data);
        reader.trim_text(true);

        let mut state = ParseState::new(self.template);
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| CityGmlError::Xml {
                position: reader.buffer_position(),
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => state.start(&e).map_err(|e| xml_error(&reader, e))?,
                Event::End(e) => state.end(e.local_name().as_ref())?,
                Event::Text(t) => {
                    if state.wants_text() {
                        let text = t.unescape().map_err(|e| xml_error(&reader, e))?;
                        state.text(&text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if state.building.is_some() {
            return Err(CityGmlError::Truncated);
        }

        debug!(
            template = %self.template,
            features = state.features.len(),
            without_geometry = state.without_geometry,
            "Parsed CityGML document"
        );

        Ok(FeatureCollection::from_parts(
            self.template.schema(),
            state.features,
        ))
    }
}

fn xml_error<R>(reader: &Reader<R>, err: quick_xml::Error) -> CityGmlError {
    CityGmlError::Xml {
        position: reader.buffer_position(),
        message: err.to_string(),
    }
}

struct BuildingBuilder {
    depth: usize,
    attributes: BTreeMap<String, AttributeValue>,
    polygons: Vec<Polygon<f64>>,
}

/// What the current text node feeds into.
enum Capture {
    None,
    Attribute(&'static AttributeSpec),
    Positions { dimension: usize },
}

struct ParseState {
    template: LodTemplate,
    depth: usize,
    building: Option<BuildingBuilder>,
    geometry_depth: Option<usize>,
    polygon: Option<PolygonBuilder>,
    ring_role: Option<RingRole>,
    ring: Vec<Coord<f64>>,
    capture: Capture,
    text: String,
    features: Vec<Feature>,
    without_geometry: usize,
}

impl ParseState {
    fn new(template: LodTemplate) -> Self {
        Self {
            template,
            depth: 0,
            building: None,
            geometry_depth: None,
            polygon: None,
            ring_role: None,
            ring: Vec::new(),
            capture: Capture::None,
            text: String::new(),
            features: Vec::new(),
            without_geometry: 0,
        }
    }

    fn wants_text(&self) -> bool {
        !matches!(self.capture, Capture::None)
    }

    fn start(&mut self, e: &BytesStart<'_>) -> std::result::Result<(), quick_xml::Error> {
        self.depth += 1;
        let name = e.local_name();
        let name = name.as_ref();

        if self.building.is_none() {
            if name == b"Building" {
                let mut attributes = BTreeMap::new();
                if let Some(id) = attribute_value(e, b"id")? {
                    attributes.insert(GML_ID.to_string(), AttributeValue::Text(id));
                }
                self.building = Some(BuildingBuilder {
                    depth: self.depth,
                    attributes,
                    polygons: Vec::new(),
                });
            }
            return Ok(());
        }

        if self.geometry_depth.is_some() {
            match name {
                b"Polygon" => self.polygon = Some(PolygonBuilder::default()),
                b"exterior" if self.polygon.is_some() => self.ring_role = Some(RingRole::Exterior),
                b"interior" if self.polygon.is_some() => self.ring_role = Some(RingRole::Interior),
                b"LinearRing" => self.ring.clear(),
                b"posList" | b"pos" => {
                    let dimension = attribute_value(e, b"srsDimension")?
                        .and_then(|d| d.parse().ok())
                        .unwrap_or(DEFAULT_DIMENSION);
                    self.capture = Capture::Positions { dimension };
                    self.text.clear();
                }
                _ => {}
            }
            return Ok(());
        }

        let local = std::str::from_utf8(name).unwrap_or_default();
        if self.template.geometry_elements().contains(&local) {
            self.geometry_depth = Some(self.depth);
        } else if let Some(spec) = self.template.attribute(local) {
            let seen = self
                .building
                .as_ref()
                .is_some_and(|b| b.attributes.contains_key(spec.name));
            if !seen {
                self.capture = Capture::Attribute(spec);
                self.text.clear();
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    fn end(&mut self, name: &[u8]) -> Result<()> {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);

        let Some(building) = self.building.as_mut() else {
            return Ok(());
        };

        match std::mem::replace(&mut self.capture, Capture::None) {
            Capture::Attribute(spec) => {
                match AttributeValue::parse_as(&self.text, spec.field_type) {
                    Some(value) => {
                        building.attributes.insert(spec.name.to_string(), value);
                    }
                    None => warn!(
                        attribute = spec.name,
                        value = %self.text,
                        "Ignoring attribute value of unexpected type"
                    ),
                }
                return Ok(());
            }
            Capture::Positions { dimension } => {
                let coords = decode_positions(&self.text, dimension)?;
                self.ring.extend(coords);
                return Ok(());
            }
            Capture::None => {}
        }

        if let Some(geometry_depth) = self.geometry_depth {
            match name {
                b"LinearRing" => {
                    if let (Some(polygon), Some(role)) = (self.polygon.as_mut(), self.ring_role) {
                        polygon.add_ring(role, std::mem::take(&mut self.ring));
                    }
                }
                b"exterior" | b"interior" => self.ring_role = None,
                b"Polygon" => {
                    if let Some(polygon) = self.polygon.take().and_then(PolygonBuilder::finish) {
                        building.polygons.push(polygon);
                    }
                }
                _ => {}
            }
            if depth == geometry_depth {
                self.geometry_depth = None;
            }
            return Ok(());
        }

        if name == b"Building" && depth == building.depth {
            if let Some(done) = self.building.take() {
                if done.polygons.is_empty() {
                    self.without_geometry += 1;
                }
                self.features.push(Feature {
                    geometry: MultiPolygon(done.polygons),
                    attributes: done.attributes,
                });
            }
        }
        Ok(())
    }
}

fn attribute_value(
    e: &BytesStart<'_>,
    local_name: &[u8],
) -> std::result::Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bldg_common::{BUILDING_ID, MEASURED_HEIGHT};

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<core:CityModel xmlns:core="http://www.opengis.net/citygml/2.0"
    xmlns:bldg="http://www.opengis.net/citygml/building/2.0"
    xmlns:gml="http://www.opengis.net/gml"
    xmlns:uro="https://www.geospatial.jp/iur/uro/3.0">
  <core:cityObjectMember>
    <bldg:Building gml:id="bldg_a">
      <bldg:class codeSpace="x">3001</bldg:class>
      <bldg:measuredHeight uom="m">12.5</bldg:measuredHeight>
      <bldg:storeysAboveGround>3</bldg:storeysAboveGround>
      <bldg:lod1Solid>
        <gml:Solid srsName="http://www.opengis.net/def/crs/EPSG/0/6697" srsDimension="3">
          <gml:exterior>
            <gml:CompositeSurface>
              <gml:surfaceMember>
                <gml:Polygon>
                  <gml:exterior>
                    <gml:LinearRing>
                      <gml:posList>35.0 139.0 0 35.0 139.001 0 35.001 139.001 0 35.001 139.0 0 35.0 139.0 0</gml:posList>
                    </gml:LinearRing>
                  </gml:exterior>
                </gml:Polygon>
              </gml:surfaceMember>
            </gml:CompositeSurface>
          </gml:exterior>
        </gml:Solid>
      </bldg:lod1Solid>
      <uro:buildingIDAttribute>
        <uro:BuildingIDAttribute>
          <uro:buildingID>13101-bldg-1</uro:buildingID>
          <uro:city codeSpace="x">13101</uro:city>
        </uro:BuildingIDAttribute>
      </uro:buildingIDAttribute>
    </bldg:Building>
  </core:cityObjectMember>
</core:CityModel>"#;

    #[test]
    fn test_parse_single_building() {
        let fc = CityGmlParser::new(LodTemplate::Lod1).parse(DOC.as_bytes()).unwrap();
        assert_eq!(fc.len(), 1);

        let f = &fc.features()[0];
        assert_eq!(f.gml_id(), Some("bldg_a"));
        assert_eq!(f.building_id(), Some("13101-bldg-1"));
        assert_eq!(f.measured_height(), Some(12.5));
        assert_eq!(f.attribute("storeysAboveGround"), Some(&AttributeValue::Integer(3)));
        assert_eq!(f.attribute("city"), Some(&AttributeValue::Text("13101".into())));
        assert_eq!(f.geometry.0.len(), 1);

        let first = f.geometry.0[0].exterior().0[0];
        assert_eq!((first.x, first.y), (139.0, 35.0));
    }

    #[test]
    fn test_lod2_template_ignores_lod1_geometry() {
        let fc = CityGmlParser::new(LodTemplate::Lod2).parse(DOC.as_bytes()).unwrap();
        assert_eq!(fc.len(), 1);
        assert!(fc.features()[0].geometry.0.is_empty());
        assert_eq!(fc.features()[0].measured_height(), Some(12.5));
    }

    #[test]
    fn test_schema_comes_from_template() {
        let fc = CityGmlParser::new(LodTemplate::Lod1).parse(DOC.as_bytes()).unwrap();
        assert!(fc.schema().contains(BUILDING_ID));
        assert!(fc.schema().contains(MEASURED_HEIGHT));
        assert!(fc.schema().contains("surveyYear"));
    }

    #[test]
    fn test_truncated_document() {
        let cut = &DOC[..DOC.find("</bldg:Building>").unwrap()];
        assert!(CityGmlParser::new(LodTemplate::Lod1).parse(cut.as_bytes()).is_err());
    }
}
