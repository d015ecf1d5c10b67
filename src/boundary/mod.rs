// src/boundary/mod.rs
//! Boundary tables: one polygon and one stable identifier per unit.

pub mod curated;
pub mod gazetteer;
pub mod reconcile;

pub use curated::{CuratedReader, CuratedUnit};
pub use gazetteer::Gazetteer;
pub use reconcile::reconcile_boundaries;

use geo::MultiPolygon;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::ReconcileError;
use crate::geo::Crs;
use crate::names::{AdminLevel, AdminPath, Script};

/// Where a record's polygon came from. Attributes are always gazetteer-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometrySource {
    Gazetteer,
    Curated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRecord {
    /// Gazetteer identifier of the unit (`GID_2` or `GID_3`).
    pub id: String,
    /// Identifier of the enclosing district; equals `id` at district level.
    pub district_id: String,
    pub path: AdminPath,
    pub geometry: MultiPolygon<f64>,
    /// Filled in by [`crate::metrics::measure_area`].
    pub area_sqm: Option<f64>,
    pub origin: GeometrySource,
}

impl BoundaryRecord {
    pub fn level(&self) -> AdminLevel {
        self.path.level()
    }
}

/// Every unit of one level, whole country, in one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryTable {
    pub level: AdminLevel,
    pub crs: Crs,
    pub records: Vec<BoundaryRecord>,
}

impl BoundaryTable {
    /// Build a table, rejecting records of another level and duplicate units.
    pub fn new(
        level: AdminLevel,
        crs: Crs,
        records: Vec<BoundaryRecord>,
    ) -> Result<Self, ReconcileError> {
        if let Some(stray) = records.iter().find(|r| r.level() != level) {
            return Err(ReconcileError::LevelMismatch {
                expected: level,
                found: stray.level(),
            });
        }
        let table = Self {
            level,
            crs,
            records,
        };
        table.validate_unique()?;
        Ok(table)
    }

    /// Names plus titles identify a unit within its parent, in either script.
    pub fn validate_unique(&self) -> Result<(), ReconcileError> {
        for script in [Script::Native, Script::Translit] {
            let mut seen: HashMap<String, &str> = HashMap::with_capacity(self.records.len());
            for rec in &self.records {
                let key = rec.path.key(script, true);
                if let Some(first) = seen.insert(key, &rec.id) {
                    return Err(ReconcileError::DuplicateBoundary {
                        level: self.level,
                        key: rec.path.to_string(),
                        ids: vec![first.to_string(), rec.id.clone()],
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BoundaryRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn curated_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.origin == GeometrySource::Curated)
            .count()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::names::{AdminName, NameKey};
    use ::geo::polygon;

    pub fn name(native: &str, title: &str) -> AdminName {
        AdminName {
            name: NameKey::new(native),
            title: NameKey::new(title),
        }
    }

    pub fn square(x0: f64, y0: f64, side: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![geo::polygon![
            (x: x0, y: y0),
            (x: x0 + side, y: y0),
            (x: x0 + side, y: y0 + side),
            (x: x0, y: y0 + side),
        ]])
    }

    pub fn district(id: &str, city: &str, title: &str, dist: &str) -> BoundaryRecord {
        BoundaryRecord {
            id: id.to_string(),
            district_id: id.to_string(),
            path: AdminPath {
                city: name(city, ""),
                district: name(dist, title),
                ward: None,
            },
            geometry: square(0.0, 0.0, 0.01),
            area_sqm: None,
            origin: GeometrySource::Gazetteer,
        }
    }

    pub fn ward(parent: &BoundaryRecord, id: &str, title: &str, ward: &str) -> BoundaryRecord {
        BoundaryRecord {
            id: id.to_string(),
            district_id: parent.id.clone(),
            path: AdminPath {
                ward: Some(name(ward, title)),
                ..parent.path.clone()
            },
            ..parent.clone()
        }
    }
}
