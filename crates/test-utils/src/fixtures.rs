//! Common test fixtures: mesh cells, AOIs and reference data.

/// Third-level JIS X 0410 mesh cells in central Tokyo.
pub mod mesh {
    /// 35.675..35.68333 N, 139.7625..139.775 E
    pub const MESH_A: &str = "53394611";

    /// East neighbour of `MESH_A`.
    pub const MESH_B: &str = "53394612";

    /// Far away cell (Osaka) that no Tokyo AOI touches.
    pub const MESH_FAR: &str = "52357600";

    const LAT_STEP: f64 = 30.0 / 3600.0;
    const LON_STEP: f64 = 45.0 / 3600.0;

    /// (min_lon, min_lat, max_lon, max_lat) of an 8-digit mesh code.
    pub fn bounds(code: &str) -> (f64, f64, f64, f64) {
        let d: Vec<f64> = code
            .chars()
            .map(|c| c.to_digit(10).expect("mesh code digit") as f64)
            .collect();
        assert_eq!(d.len(), 8, "third-level mesh code");
        let lat = (d[0] * 10.0 + d[1]) / 1.5 + d[4] * 5.0 / 60.0 + d[6] * LAT_STEP;
        let lon = d[2] * 10.0 + d[3] + 100.0 + d[5] * 7.5 / 60.0 + d[7] * LON_STEP;
        (lon, lat, lon + LON_STEP, lat + LAT_STEP)
    }

    /// Centre (lon, lat) of a mesh cell.
    pub fn center(code: &str) -> (f64, f64) {
        let (x0, y0, x1, y1) = bounds(code);
        ((x0 + x1) / 2.0, (y0 + y1) / 2.0)
    }
}

/// Area-of-interest GeoJSON documents.
pub mod aoi {
    /// A rectangle as a GeoJSON Polygon geometry.
    pub fn rect_geometry(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> String {
        format!(
            r#"{{"type":"Polygon","coordinates":[[[{min_lon},{min_lat}],[{max_lon},{min_lat}],[{max_lon},{max_lat}],[{min_lon},{max_lat}],[{min_lon},{min_lat}]]]}}"#
        )
    }

    /// A rectangle wrapped in a FeatureCollection, as drawn on a map.
    pub fn rect_feature_collection(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> String {
        format!(
            r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{}},"geometry":{}}}]}}"#,
            rect_geometry(min_lon, min_lat, max_lon, max_lat)
        )
    }

    /// Rectangle covering the interior of the given mesh cells, shrunk by
    /// `inset` degrees on every side.
    pub fn covering(codes: &[&str], inset: f64) -> (f64, f64, f64, f64) {
        let mut bbox = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for code in codes {
            let (x0, y0, x1, y1) = super::mesh::bounds(code);
            bbox = (bbox.0.min(x0), bbox.1.min(y0), bbox.2.max(x1), bbox.3.max(y1));
        }
        (bbox.0 + inset, bbox.1 + inset, bbox.2 - inset, bbox.3 - inset)
    }
}

/// Static reference data documents.
pub mod reference {
    /// Chiyoda-ku
    pub const LG_CODE: &str = "13101";

    pub const DATASET_ID: &str = "plateau-13101-chiyoda-ku-2023";

    pub const RESOURCE_ID: &str = "r1-13101-citygml";

    /// Grid layer GeoJSON with one polygon per mesh code and a `code` property.
    pub fn grid_geojson(codes: &[&str]) -> String {
        let features: Vec<String> = codes
            .iter()
            .map(|code| {
                let (x0, y0, x1, y1) = super::mesh::bounds(code);
                format!(
                    r#"{{"type":"Feature","properties":{{"code":"{code}"}},"geometry":{}}}"#,
                    super::aoi::rect_geometry(x0, y0, x1, y1)
                )
            })
            .collect();
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
    }

    /// Registry JSON; `latest` is omitted when `None`.
    pub fn registry_json(entries: &[(&str, Option<bool>, &str)]) -> String {
        let list: Vec<serde_json::Value> = entries
            .iter()
            .map(|(dataset_id, latest, resource)| {
                let mut entry = serde_json::json!({
                    "dataset_id": dataset_id,
                    "citygml": resource,
                });
                if let Some(latest) = latest {
                    entry["latest"] = serde_json::Value::Bool(*latest);
                }
                entry
            })
            .collect();
        serde_json::json!({ "dataset_list": list }).to_string()
    }

    /// `mesh_code,lg_code` CSV table.
    pub fn codes_csv(rows: &[(&str, &str)]) -> String {
        let mut out = String::from("mesh_code,lg_code\n");
        for (mesh, lg) in rows {
            out.push_str(mesh);
            out.push(',');
            out.push_str(lg);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_bounds() {
        let (x0, y0, x1, y1) = mesh::bounds(mesh::MESH_A);
        crate::assert_approx_eq!(x0, 139.7625, 1e-9);
        crate::assert_approx_eq!(y0, 35.675, 1e-9);
        crate::assert_approx_eq!(x1, 139.775, 1e-6);
        crate::assert_approx_eq!(y1, 35.683333, 1e-6);

        let (bx0, by0, _, _) = mesh::bounds(mesh::MESH_B);
        crate::assert_approx_eq!(bx0, x1, 1e-9);
        crate::assert_approx_eq!(by0, y0, 1e-9);
    }

    #[test]
    fn test_registry_json_latest_flag() {
        let json = reference::registry_json(&[("a", Some(true), "r1"), ("b", None, "r2")]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["dataset_list"][0]["latest"], true);
        assert!(value["dataset_list"][1].get("latest").is_none());
    }
}
