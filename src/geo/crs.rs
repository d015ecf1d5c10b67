// src/geo/crs.rs
//! The three coordinate reference systems the pipeline touches.
//!
//! * `EPSG:4326` : WGS 84 longitude/latitude (display + gazetteer)
//! * `EPSG:326zz` / `EPSG:327zz` : WGS 84 / UTM zone zz north / south
//! * `EPSG:6933` : WGS 84 / NSIDC EASE-Grid 2.0 Global, an equal-area
//!   cylindrical projection used only to measure areas
//!
//! Transforms run through `proj4rs`, which works in radians for geographic
//! systems; [`Reprojection`] hides that and speaks degrees.

use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj, transform::transform};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::ReconcileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    Wgs84,
    Utm { zone: u8, north: bool },
    EqualArea,
}

impl Crs {
    pub fn epsg(self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::Utm { zone, north: true } => 32600 + zone as u32,
            Crs::Utm { zone, north: false } => 32700 + zone as u32,
            Crs::EqualArea => 6933,
        }
    }

    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(Crs::Wgs84),
            6933 => Some(Crs::EqualArea),
            32601..=32660 => Some(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Some(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => None,
        }
    }

    /// proj4 definition, as published for the EPSG code.
    pub fn proj_string(self) -> String {
        match self {
            Crs::Wgs84 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            Crs::Utm { zone, north } => format!(
                "+proj=utm +zone={}{} +datum=WGS84 +units=m +no_defs",
                zone,
                if north { "" } else { " +south" }
            ),
            Crs::EqualArea => {
                "+proj=cea +lat_ts=30 +lon_0=0 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs"
                    .to_string()
            }
        }
    }

    pub fn is_geographic(self) -> bool {
        matches!(self, Crs::Wgs84)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = ReconcileError;

    /// Accepts `EPSG:n`, `urn:ogc:def:crs:EPSG::n`, and the OGC CRS84 URN.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") {
            return Ok(Crs::Wgs84);
        }
        t.rsplit(':')
            .next()
            .and_then(|code| code.parse::<u32>().ok())
            .and_then(Crs::from_epsg)
            .ok_or_else(|| ReconcileError::UnsupportedCrs(s.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = ReconcileError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// A compiled `from -> to` transform.
pub struct Reprojection {
    from: Crs,
    to: Crs,
    src: Proj,
    dst: Proj,
}

impl Reprojection {
    pub fn new(from: Crs, to: Crs) -> Result<Self, ReconcileError> {
        let compile = |crs: Crs| {
            Proj::from_proj_string(&crs.proj_string()).map_err(|e| ReconcileError::Projection {
                from,
                to,
                reason: e.to_string(),
            })
        };
        Ok(Self {
            from,
            to,
            src: compile(from)?,
            dst: compile(to)?,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Transform one coordinate; degrees in and out for WGS 84.
    pub fn coord(&self, c: Coord<f64>) -> Result<Coord<f64>, ReconcileError> {
        if self.is_identity() {
            return Ok(c);
        }
        let mut p = if self.from.is_geographic() {
            (c.x.to_radians(), c.y.to_radians(), 0.0)
        } else {
            (c.x, c.y, 0.0)
        };
        transform(&self.src, &self.dst, &mut p).map_err(|e| self.failed(e.to_string()))?;
        if !(p.0.is_finite() && p.1.is_finite()) {
            return Err(self.failed(format!("({}, {}) has no image", c.x, c.y)));
        }
        Ok(if self.to.is_geographic() {
            Coord {
                x: p.0.to_degrees(),
                y: p.1.to_degrees(),
            }
        } else {
            Coord { x: p.0, y: p.1 }
        })
    }

    pub fn apply(&self, g: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, ReconcileError> {
        if self.is_identity() {
            return Ok(g.clone());
        }
        g.try_map_coords(|c| self.coord(c))
    }

    fn failed(&self, reason: String) -> ReconcileError {
        ReconcileError::Projection {
            from: self.from,
            to: self.to,
            reason,
        }
    }
}
