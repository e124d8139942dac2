//! GML position list decoding and polygon assembly.

use geo::{Coord, LineString, Polygon};

use crate::error::{CityGmlError, Result};

/// Default `srsDimension` of EPSG:6697 positions (lat, lon, height).
pub(crate) const DEFAULT_DIMENSION: usize = 3;

/// Decode a `gml:posList` / `gml:pos` text body into (lon, lat) coordinates.
pub(crate) fn decode_positions(text: &str, dimension: usize) -> Result<Vec<Coord<f64>>> {
    if !(2..=3).contains(&dimension) {
        return Err(CityGmlError::geometry(
            "posList",
            format!("unsupported srsDimension {dimension}"),
        ));
    }

    let values = text
        .split_ascii_whitespace()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| CityGmlError::geometry("posList", format!("invalid number '{v}'")))
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() % dimension != 0 {
        return Err(CityGmlError::geometry(
            "posList",
            format!(
                "{} values is not a multiple of dimension {}",
                values.len(),
                dimension
            ),
        ));
    }

    Ok(values
        .chunks_exact(dimension)
        .map(|c| Coord { x: c[1], y: c[0] })
        .collect())
}

/// Which ring of a polygon is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RingRole {
    Exterior,
    Interior,
}

/// Accumulates the rings of one `gml:Polygon`.
#[derive(Debug, Default)]
pub(crate) struct PolygonBuilder {
    exterior: Option<LineString<f64>>,
    interiors: Vec<LineString<f64>>,
}

impl PolygonBuilder {
    pub(crate) fn add_ring(&mut self, role: RingRole, mut coords: Vec<Coord<f64>>) {
        if coords.len() < 3 {
            return;
        }
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }
        let ring = LineString::new(coords);
        match role {
            RingRole::Exterior => self.exterior = Some(ring),
            RingRole::Interior => self.interiors.push(ring),
        }
    }

    /// Finish the polygon; `None` when no usable exterior ring was read.
    pub(crate) fn finish(self) -> Option<Polygon<f64>> {
        let exterior = self.exterior?;
        Some(Polygon::new(exterior, self.interiors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_swaps_axis_order() {
        let coords = decode_positions("35.1 139.2 10.0 35.3 139.4 12.0", 3).unwrap();
        assert_eq!(coords, vec![Coord { x: 139.2, y: 35.1 }, Coord { x: 139.4, y: 35.3 }]);
    }

    #[test]
    fn test_decode_two_dimensional() {
        let coords = decode_positions("35.1 139.2", 2).unwrap();
        assert_eq!(coords, vec![Coord { x: 139.2, y: 35.1 }]);
    }

    #[test]
    fn test_decode_rejects_ragged_list() {
        assert!(decode_positions("35.1 139.2 10.0 35.3", 3).is_err());
        assert!(decode_positions("35.1 abc 10.0", 3).is_err());
    }

    #[test]
    fn test_builder_closes_ring() {
        let mut builder = PolygonBuilder::default();
        builder.add_ring(
            RingRole::Exterior,
            vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 1.0, y: 0.0 },
                Coord { x: 1.0, y: 1.0 },
            ],
        );
        let polygon = builder.finish().unwrap();
        assert_eq!(polygon.exterior().0.len(), 4);
        assert!(polygon.exterior().is_closed());
    }

    #[test]
    fn test_builder_without_exterior() {
        assert!(PolygonBuilder::default().finish().is_none());
    }
}
