//! Static reference data: the grid layer, the dataset registry and the
//! mesh-to-municipality code table.
//!
//! All three are loaded once at startup and only read afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use bldg_common::{BldgError, MeshCode};
use geo::{BoundingRect, Intersects, Polygon};
use geojson::GeoJson;
use rstar::{RTree, RTreeObject, AABB};
use serde::Deserialize;
use tracing::info;

use crate::error::{ExtractError, Result};

/// Property of the grid layer holding the cell code.
pub const CODE_PROPERTY: &str = "code";

/// One grid cell of the reference layer.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub code: String,
    pub geometry: Polygon<f64>,
}

/// Envelope of the cell at `index` in `GridIndex::cells`.
struct CellBox {
    index: usize,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for CellBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

/// Grid cells with unique codes behind an R-tree.
pub struct GridIndex {
    cells: Vec<GridCell>,
    by_code: HashMap<String, usize>,
    tree: RTree<CellBox>,
}

impl GridIndex {
    /// Index `cells`; codes must be unique.
    pub fn new(cells: Vec<GridCell>) -> Result<Self> {
        let mut by_code = HashMap::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            if by_code.insert(cell.code.clone(), i).is_some() {
                return Err(BldgError::DuplicateCellCode(cell.code.clone()).into());
            }
        }

        let boxes = cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| {
                let rect = cell.geometry.bounding_rect()?;
                Some(CellBox {
                    index,
                    env: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Ok(Self {
            cells,
            by_code,
            tree: RTree::bulk_load(boxes),
        })
    }

    /// Build cells directly from third-level mesh codes.
    pub fn from_mesh_codes<'a>(codes: impl IntoIterator<Item = &'a MeshCode>) -> Result<Self> {
        let cells = codes
            .into_iter()
            .map(|code| GridCell {
                code: code.to_string(),
                geometry: code.polygon(),
            })
            .collect();
        Self::new(cells)
    }

    /// Load a GeoJSON FeatureCollection with a `code` property per feature.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let geojson: GeoJson = text.parse().map_err(BldgError::from)?;
        let GeoJson::FeatureCollection(fc) = geojson else {
            return Err(ExtractError::reference("grid", "expected a FeatureCollection"));
        };

        let mut cells = Vec::with_capacity(fc.features.len());
        for (i, feature) in fc.features.into_iter().enumerate() {
            let code = match feature.property(CODE_PROPERTY) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => {
                    return Err(ExtractError::reference(
                        "grid",
                        format!("feature #{i} has no '{CODE_PROPERTY}' property"),
                    ))
                }
            };
            let geometry = feature
                .geometry
                .ok_or_else(|| ExtractError::reference("grid", format!("cell {code} has no geometry")))?;
            let geometry = match geo::Geometry::<f64>::try_from(geometry.value) {
                Ok(geo::Geometry::Polygon(p)) => p,
                Ok(geo::Geometry::MultiPolygon(mut mp)) if mp.0.len() == 1 => mp.0.remove(0),
                _ => {
                    return Err(ExtractError::reference(
                        "grid",
                        format!("cell {code} is not a polygon"),
                    ))
                }
            };
            cells.push(GridCell { code, geometry });
        }

        Self::new(cells)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn get(&self, code: &str) -> Option<&GridCell> {
        self.by_code.get(code).map(|&i| &self.cells[i])
    }

    /// Cells whose geometry intersects `geometry`, in index order.
    pub fn intersecting(&self, geometry: &Polygon<f64>) -> Vec<&GridCell> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let query = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|b| b.index)
            .filter(|&i| self.cells[i].geometry.intersects(geometry))
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.cells[i]).collect()
    }
}

/// One dataset of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub dataset_id: String,
    pub resource_id: String,
    /// Set when `latest` is present and truthy. `latest: false` and
    /// `latest: null` count as not current, unlike a key-presence check.
    pub is_current: bool,
}

#[derive(Deserialize)]
struct RegistryDocument {
    dataset_list: Vec<RawDatasetEntry>,
}

#[derive(Deserialize)]
struct RawDatasetEntry {
    dataset_id: String,
    #[serde(default)]
    latest: Option<serde_json::Value>,
    #[serde(default)]
    citygml: Option<String>,
}

/// Registry of published city model datasets.
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    entries: Vec<DatasetEntry>,
}

impl CatalogRegistry {
    pub fn new(entries: Vec<DatasetEntry>) -> Self {
        Self { entries }
    }

    /// Parse `{"dataset_list": [{dataset_id, latest?, citygml}, ...]}`.
    ///
    /// Entries without a `citygml` resource are skipped. An entry is current
    /// when `latest` is present and neither `false` nor `null`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let doc: RegistryDocument = serde_json::from_str(text)
            .map_err(|e| ExtractError::reference("registry", e.to_string()))?;

        let entries = doc
            .dataset_list
            .into_iter()
            .filter_map(|raw| {
                let resource_id = raw.citygml?;
                let is_current = !matches!(
                    raw.latest,
                    None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false))
                );
                Some(DatasetEntry {
                    dataset_id: raw.dataset_id,
                    resource_id,
                    is_current,
                })
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current entries whose dataset id contains `municipality`, in registry order.
    pub fn current_for<'a>(&'a self, municipality: &'a str) -> impl Iterator<Item = &'a DatasetEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.is_current && e.dataset_id.contains(municipality))
    }
}

#[derive(Deserialize)]
struct CodeRow {
    mesh_code: String,
    lg_code: String,
}

/// Mapping between municipality codes and mesh cells.
#[derive(Debug, Clone, Default)]
pub struct MeshMunicipalityMap {
    by_mesh: BTreeMap<String, Vec<String>>,
    by_municipality: BTreeMap<String, BTreeSet<String>>,
}

impl MeshMunicipalityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `municipality` covers `mesh`.
    pub fn insert(&mut self, mesh: impl Into<String>, municipality: impl Into<String>) {
        let mesh = mesh.into();
        let municipality = municipality.into();

        let lgs = self.by_mesh.entry(mesh.clone()).or_default();
        if !lgs.contains(&municipality) {
            lgs.push(municipality.clone());
        }
        self.by_municipality.entry(municipality).or_default().insert(mesh);
    }

    /// Parse a CSV table with `mesh_code` and `lg_code` columns.
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut map = Self::new();
        let mut csv = csv::Reader::from_reader(reader);
        for row in csv.deserialize::<CodeRow>() {
            let row = row.map_err(|e| ExtractError::reference("code table", e.to_string()))?;
            map.insert(row.mesh_code.trim(), row.lg_code.trim());
        }
        Ok(map)
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_csv_reader(text.as_bytes())
    }

    /// Municipalities covering `mesh`, in table order.
    pub fn municipalities_for(&self, mesh: &str) -> &[String] {
        self.by_mesh.get(mesh).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mesh cells of `municipality`.
    pub fn cells_for(&self, municipality: &str) -> Option<&BTreeSet<String>> {
        self.by_municipality.get(municipality)
    }

    pub fn len(&self) -> usize {
        self.by_mesh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mesh.is_empty()
    }
}

/// The three static inputs of the resolver.
pub struct ReferenceData {
    pub grid: GridIndex,
    pub registry: CatalogRegistry,
    pub codes: MeshMunicipalityMap,
}

impl ReferenceData {
    pub fn new(grid: GridIndex, registry: CatalogRegistry, codes: MeshMunicipalityMap) -> Self {
        Self {
            grid,
            registry,
            codes,
        }
    }

    /// Load the grid GeoJSON, registry JSON and code CSV from disk.
    pub fn load(grid: &Path, registry: &Path, codes: &Path) -> Result<Self> {
        let read = |path: &Path| {
            std::fs::read_to_string(path)
                .map_err(|e| ExtractError::reference(path.display().to_string(), e.to_string()))
        };

        let grid = GridIndex::from_geojson_str(&read(grid)?)?;
        let registry = CatalogRegistry::from_json_str(&read(registry)?)?;
        let codes = MeshMunicipalityMap::from_csv_str(&read(codes)?)?;

        info!(
            cells = grid.len(),
            datasets = registry.len(),
            meshes = codes.len(),
            "Loaded reference data"
        );

        Ok(Self::new(grid, registry, codes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{mesh, reference};

    fn codes(list: &[&str]) -> Vec<MeshCode> {
        list.iter().map(|c| MeshCode::parse(c).unwrap()).collect()
    }

    #[test]
    fn test_grid_rejects_duplicate_codes() {
        let err = GridIndex::from_mesh_codes(&codes(&[mesh::MESH_A, mesh::MESH_A])).err().unwrap();
        assert!(matches!(
            err,
            ExtractError::Common(BldgError::DuplicateCellCode(_))
        ));
    }

    #[test]
    fn test_grid_from_geojson() {
        let grid =
            GridIndex::from_geojson_str(&reference::grid_geojson(&[mesh::MESH_A, mesh::MESH_B]))
                .unwrap();
        assert_eq!(grid.len(), 2);
        assert!(grid.get(mesh::MESH_B).is_some());
    }

    #[test]
    fn test_grid_query_in_index_order() {
        // Loaded in reverse so index order differs from code order
        let grid = GridIndex::from_mesh_codes(&codes(&[mesh::MESH_B, mesh::MESH_A, mesh::MESH_FAR]))
            .unwrap();
        let (x0, y0, x1, y1) = test_utils::aoi::covering(&[mesh::MESH_A, mesh::MESH_B], 0.001);
        let aoi = geo::Rect::new((x0, y0), (x1, y1)).to_polygon();

        let hits: Vec<&str> = grid.intersecting(&aoi).iter().map(|c| c.code.as_str()).collect();
        assert_eq!(hits, vec![mesh::MESH_B, mesh::MESH_A]);
    }

    #[test]
    fn test_registry_current_flag() {
        let registry = CatalogRegistry::from_json_str(&reference::registry_json(&[
            ("plateau-13101-chiyoda-ku-2023", Some(true), "r-new"),
            ("plateau-13101-chiyoda-ku-2020", None, "r-old"),
            ("plateau-13101-chiyoda-ku-2022", Some(false), "r-stale"),
            ("plateau-13102-chuo-ku-2023", Some(true), "r-other"),
        ]))
        .unwrap();

        let current: Vec<&str> = registry
            .current_for("13101")
            .map(|e| e.resource_id.as_str())
            .collect();
        assert_eq!(current, vec!["r-new"]);
    }

    #[test]
    fn test_registry_skips_entries_without_citygml() {
        let registry = CatalogRegistry::from_json_str(
            r#"{"dataset_list":[{"dataset_id":"a","latest":true},{"dataset_id":"b","latest":true,"citygml":"r"}]}"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_code_table() {
        let map = MeshMunicipalityMap::from_csv_str(&reference::codes_csv(&[
            (mesh::MESH_A, "13101"),
            (mesh::MESH_A, "13102"),
            (mesh::MESH_B, "13101"),
            (mesh::MESH_A, "13101"),
        ]))
        .unwrap();

        assert_eq!(map.municipalities_for(mesh::MESH_A), &["13101", "13102"]);
        assert_eq!(map.cells_for("13101").unwrap().len(), 2);
        assert!(map.municipalities_for(mesh::MESH_FAR).is_empty());
    }
}
