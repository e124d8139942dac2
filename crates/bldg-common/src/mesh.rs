//! JIS X 0410 standard regional mesh codes.
//!
//! Third-level meshes ("3次メッシュ", 8 digits) are the grid cells the
//! building archives are partitioned by. Each cell spans 30" of latitude
//! and 45" of longitude.
//!
//! Code layout: `pp qq r s t u`
//! - `pp`: latitude / 1.5 (first level, 40' bands)
//! - `qq`: longitude - 100 (first level, 1 degree bands)
//! - `r`, `s`: second-level row/column (0-7)
//! - `t`, `u`: third-level row/column (0-9)

use std::fmt;
use std::str::FromStr;

use geo::{Polygon, Rect};

use crate::error::{BldgError, BldgResult};

const FIRST_LAT: f64 = 40.0 / 60.0;
const SECOND_LAT: f64 = FIRST_LAT / 8.0;
const SECOND_LON: f64 = 1.0 / 8.0;
const THIRD_LAT: f64 = SECOND_LAT / 10.0;
const THIRD_LON: f64 = SECOND_LON / 10.0;

/// A validated third-level mesh code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshCode(u32);

impl MeshCode {
    /// Parse and validate an 8-digit mesh code.
    pub fn parse(code: &str) -> BldgResult<Self> {
        code.parse()
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Geographic extent of the cell as (lon, lat).
    pub fn bounds(&self) -> Rect<f64> {
        let digits = self.digits();
        let p = (digits[0] * 10 + digits[1]) as f64;
        let q = (digits[2] * 10 + digits[3]) as f64;
        let (r, s, t, u) = (
            digits[4] as f64,
            digits[5] as f64,
            digits[6] as f64,
            digits[7] as f64,
        );

        let min_lat = p * FIRST_LAT + r * SECOND_LAT + t * THIRD_LAT;
        let min_lon = 100.0 + q + s * SECOND_LON + u * THIRD_LON;

        Rect::new(
            (min_lon, min_lat),
            (min_lon + THIRD_LON, min_lat + THIRD_LAT),
        )
    }

    /// Cell footprint polygon.
    pub fn polygon(&self) -> Polygon<f64> {
        self.bounds().to_polygon()
    }

    /// Mesh code of the third-level cell containing a (lon, lat) position.
    pub fn containing(lon: f64, lat: f64) -> BldgResult<Self> {
        let p = (lat / FIRST_LAT).floor();
        let q = lon.floor() - 100.0;
        if !(0.0..100.0).contains(&p) || !(0.0..100.0).contains(&q) {
            return Err(BldgError::invalid_mesh_code(
                format!("({lon}, {lat})"),
                "position outside the mesh system",
            ));
        }
        let lat_rem = lat - p * FIRST_LAT;
        let lon_rem = lon - (q + 100.0);
        let r = (lat_rem / SECOND_LAT).floor().min(7.0);
        let s = (lon_rem / SECOND_LON).floor().min(7.0);
        let t = ((lat_rem - r * SECOND_LAT) / THIRD_LAT).floor().min(9.0);
        let u = ((lon_rem - s * SECOND_LON) / THIRD_LON).floor().min(9.0);

        let code = format!(
            "{:02}{:02}{}{}{}{}",
            p as u32, q as u32, r as u32, s as u32, t as u32, u as u32
        );
        code.parse()
    }

    fn digits(&self) -> [u32; 8] {
        let mut out = [0u32; 8];
        let mut v = self.0;
        for slot in out.iter_mut().rev() {
            *slot = v % 10;
            v /= 10;
        }
        out
    }
}

impl FromStr for MeshCode {
    type Err = BldgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BldgError::invalid_mesh_code(s, "expected 8 digits"));
        }
        let bytes = s.as_bytes();
        let digit = |i: usize| (bytes[i] - b'0') as u32;
        if digit(4) > 7 || digit(5) > 7 {
            return Err(BldgError::invalid_mesh_code(
                s,
                "second-level digits must be 0-7",
            ));
        }
        let value = s
            .parse()
            .map_err(|_| BldgError::invalid_mesh_code(s, "not a number"))?;
        Ok(MeshCode(value))
    }
}

impl fmt::Display for MeshCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}
