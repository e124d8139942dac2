//! Synthetic PLATEAU CityGML documents and ZIP deliveries.
//!
//! Buildings are axis-aligned boxes. Each building carries an LOD1 solid
//! (six faces) and LOD2 boundary surfaces (ground and roof), so the same
//! document exercises both templates.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One building box in a synthetic document.
#[derive(Debug, Clone)]
pub struct BuildingSpec {
    pub gml_id: String,
    pub building_id: Option<String>,
    pub height: Option<f64>,
    pub storeys: Option<i64>,
    /// (min_lon, min_lat, max_lon, max_lat)
    pub footprint: (f64, f64, f64, f64),
    pub with_geometry: bool,
}

impl BuildingSpec {
    pub fn new(gml_id: impl Into<String>, footprint: (f64, f64, f64, f64)) -> Self {
        Self {
            gml_id: gml_id.into(),
            building_id: None,
            height: None,
            storeys: None,
            footprint,
            with_geometry: true,
        }
    }

    /// Square footprint of `half` degrees around (lon, lat).
    pub fn around(gml_id: impl Into<String>, lon: f64, lat: f64, half: f64) -> Self {
        Self::new(gml_id, (lon - half, lat - half, lon + half, lat + half))
    }

    pub fn building_id(mut self, id: impl Into<String>) -> Self {
        self.building_id = Some(id.into());
        self
    }

    pub fn height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn storeys(mut self, storeys: i64) -> Self {
        self.storeys = Some(storeys);
        self
    }

    pub fn without_geometry(mut self) -> Self {
        self.with_geometry = false;
        self
    }
}

/// `lat lon z` position list of a closed ring.
fn pos_list(corners: &[(f64, f64, f64)]) -> String {
    let mut out = String::new();
    for (lon, lat, z) in corners.iter().chain(corners.first()) {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{lat} {lon} {z}");
    }
    out
}

fn polygon(id: Option<&str>, corners: &[(f64, f64, f64)]) -> String {
    let id_attr = id.map(|id| format!(" gml:id=\"{id}\"")).unwrap_or_default();
    format!(
        "<gml:Polygon{id_attr}><gml:exterior><gml:LinearRing>\
         <gml:posList srsDimension=\"3\">{}</gml:posList>\
         </gml:LinearRing></gml:exterior></gml:Polygon>",
        pos_list(corners)
    )
}

fn building_xml(b: &BuildingSpec, out: &mut String) {
    let (x0, y0, x1, y1) = b.footprint;
    let h = b.height.unwrap_or(10.0);
    let ground = [(x0, y0, 0.0), (x0, y1, 0.0), (x1, y1, 0.0), (x1, y0, 0.0)];
    let roof = [(x0, y0, h), (x1, y0, h), (x1, y1, h), (x0, y1, h)];

    let _ = write!(out, "<core:cityObjectMember><bldg:Building gml:id=\"{}\">", b.gml_id);
    out.push_str("<bldg:class codeSpace=\"../../codelists/Building_class.xml\">3001</bldg:class>");
    if let Some(height) = b.height {
        let _ = write!(out, "<bldg:measuredHeight uom=\"m\">{height}</bldg:measuredHeight>");
    }
    if let Some(storeys) = b.storeys {
        let _ = write!(out, "<bldg:storeysAboveGround>{storeys}</bldg:storeysAboveGround>");
    }

    if b.with_geometry {
        out.push_str("<bldg:lod1Solid><gml:Solid><gml:exterior><gml:CompositeSurface>");
        let walls = [
            [(x0, y0, 0.0), (x1, y0, 0.0), (x1, y0, h), (x0, y0, h)],
            [(x1, y0, 0.0), (x1, y1, 0.0), (x1, y1, h), (x1, y0, h)],
            [(x1, y1, 0.0), (x0, y1, 0.0), (x0, y1, h), (x1, y1, h)],
            [(x0, y1, 0.0), (x0, y0, 0.0), (x0, y0, h), (x0, y1, h)],
        ];
        for face in [&ground[..], &roof[..]]
            .into_iter()
            .chain(walls.iter().map(|w| &w[..]))
        {
            out.push_str("<gml:surfaceMember>");
            out.push_str(&polygon(None, face));
            out.push_str("</gml:surfaceMember>");
        }
        out.push_str("</gml:CompositeSurface></gml:exterior></gml:Solid></bldg:lod1Solid>");

        let ground_id = format!("{}_ground", b.gml_id);
        let roof_id = format!("{}_roof", b.gml_id);
        let _ = write!(
            out,
            "<bldg:lod2Solid><gml:Solid><gml:exterior><gml:CompositeSurface>\
             <gml:surfaceMember xlink:href=\"#{ground_id}\"/>\
             <gml:surfaceMember xlink:href=\"#{roof_id}\"/>\
             </gml:CompositeSurface></gml:exterior></gml:Solid></bldg:lod2Solid>"
        );
        for (kind, id, face) in [
            ("GroundSurface", &ground_id, &ground[..]),
            ("RoofSurface", &roof_id, &roof[..]),
        ] {
            let _ = write!(
                out,
                "<bldg:boundedBy><bldg:{kind}><bldg:lod2MultiSurface><gml:MultiSurface>\
                 <gml:surfaceMember>{}</gml:surfaceMember>\
                 </gml:MultiSurface></bldg:lod2MultiSurface></bldg:{kind}></bldg:boundedBy>",
                polygon(Some(id), face)
            );
        }
    }

    out.push_str("<uro:buildingIDAttribute><uro:BuildingIDAttribute>");
    if let Some(id) = &b.building_id {
        let _ = write!(out, "<uro:buildingID>{id}</uro:buildingID>");
    }
    out.push_str("<uro:prefecture codeSpace=\"../../codelists/Common_localPublicAuthorities.xml\">13</uro:prefecture>");
    out.push_str("<uro:city codeSpace=\"../../codelists/Common_localPublicAuthorities.xml\">13101</uro:city>");
    out.push_str("</uro:BuildingIDAttribute></uro:buildingIDAttribute>");
    out.push_str("</bldg:Building></core:cityObjectMember>");
}

/// A CityGML 2.0 document with one `bldg:Building` per spec.
pub fn citygml_document(buildings: &[BuildingSpec]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<core:CityModel xmlns:core="http://www.opengis.net/citygml/2.0" xmlns:bldg="http://www.opengis.net/citygml/building/2.0" xmlns:gml="http://www.opengis.net/gml" xmlns:xlink="http://www.w3.org/1999/xlink" xmlns:uro="https://www.geospatial.jp/iur/uro/3.0">
<gml:boundedBy><gml:Envelope srsName="http://www.opengis.net/def/crs/EPSG/0/6697" srsDimension="3"><gml:lowerCorner>35.675 139.7625 0</gml:lowerCorner><gml:upperCorner>35.68333 139.775 100</gml:upperCorner></gml:Envelope></gml:boundedBy>
"#,
    );
    for building in buildings {
        building_xml(building, &mut out);
        out.push('\n');
    }
    out.push_str("</core:CityModel>\n");
    out
}

/// Path of a cell's building file inside a delivery archive.
pub fn bldg_entry_name(mesh_code: &str) -> String {
    format!("udx/bldg/{mesh_code}_bldg_6697_op.gml")
}

fn write_archive(entries: &[(&str, &[u8])], method: CompressionMethod) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(method);
    for (name, data) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip archive").into_inner()
}

/// A ZIP archive with deflated entries.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    write_archive(entries, CompressionMethod::Deflated)
}

/// A ZIP archive with stored (uncompressed) entries.
pub fn zip_archive_stored(entries: &[(&str, &[u8])]) -> Vec<u8> {
    write_archive(entries, CompressionMethod::Stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_contains_buildings() {
        let doc = citygml_document(&[
            BuildingSpec::around("b1", 139.765, 35.678, 0.0001)
                .building_id("13101-bldg-1")
                .height(12.0),
            BuildingSpec::around("b2", 139.766, 35.678, 0.0001).without_geometry(),
        ]);
        assert_eq!(doc.matches("<bldg:Building ").count(), 2);
        assert!(doc.contains("13101-bldg-1"));
        assert_eq!(doc.matches("<bldg:lod1Solid>").count(), 1);
    }

    #[test]
    fn test_pos_list_is_lat_lon_and_closed() {
        let list = pos_list(&[(139.0, 35.0, 0.0), (139.1, 35.0, 0.0), (139.1, 35.1, 0.0)]);
        assert!(list.starts_with("35 139 0"));
        assert!(list.ends_with("35 139 0"));
    }

    #[test]
    fn test_zip_archive_is_readable() {
        let data = zip_archive(&[("udx/bldg/a.gml", b"hello")]);
        let archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 1);
    }
}
