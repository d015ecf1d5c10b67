// src/population/mod.rs
//! Flat population tables and their identity resolution.

pub mod join;

pub use join::{left_join, resolve_identifiers, ResolvedRecord, ResolvedTable, Tier};

use crate::names::{AdminLevel, AdminPath};

/// One census row: where it is and what was counted there.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    /// 1-based line of the row in its source sheet.
    pub line: usize,
    pub path: AdminPath,
    /// Aligned with [`PopulationTable::metric_names`].
    pub metrics: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationTable {
    /// Export name, e.g. `VN_Population_ward`.
    pub name: String,
    pub level: AdminLevel,
    pub metric_names: Vec<String>,
    pub records: Vec<PopulationRecord>,
}

impl PopulationTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
