// src/population/join.rs
//! Cascading identity join.
//!
//! Four independent left joins against the boundary table, from the most to
//! the least specific key, reduced row by row: the identifier is the first
//! tier that matched, and the area is coalesced with the same precedence.

use rayon::prelude::*;
use serde::Serialize;
use std::{collections::BTreeMap, collections::HashMap, fmt};
use tracing::{debug, info, warn};

use super::{PopulationRecord, PopulationTable};
use crate::boundary::{BoundaryRecord, BoundaryTable};
use crate::error::ReconcileError;
use crate::names::{AdminLevel, AdminPath, Script};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Native names and titles.
    FullNative,
    /// Transliterated names and titles.
    FullTranslit,
    /// Native names only.
    PartialNative,
    /// Transliterated names only.
    PartialTranslit,
}

impl Tier {
    pub const CASCADE: [Tier; 4] = [
        Tier::FullNative,
        Tier::FullTranslit,
        Tier::PartialNative,
        Tier::PartialTranslit,
    ];

    pub fn number(self) -> u8 {
        match self {
            Tier::FullNative => 1,
            Tier::FullTranslit => 2,
            Tier::PartialNative => 3,
            Tier::PartialTranslit => 4,
        }
    }

    pub fn script(self) -> Script {
        match self {
            Tier::FullNative | Tier::PartialNative => Script::Native,
            Tier::FullTranslit | Tier::PartialTranslit => Script::Translit,
        }
    }

    pub fn titled(self) -> bool {
        matches!(self, Tier::FullNative | Tier::FullTranslit)
    }

    pub fn key(self, path: &AdminPath) -> String {
        path.key(self.script(), self.titled())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Left join of `population` against `boundaries` on the key of `tier`.
///
/// A key carried by more than one boundary is ambiguous and matches nothing.
pub fn left_join<'b>(
    tier: Tier,
    population: &[PopulationRecord],
    boundaries: &'b BoundaryTable,
) -> Vec<Option<&'b BoundaryRecord>> {
    let mut index: HashMap<String, Vec<&'b BoundaryRecord>> =
        HashMap::with_capacity(boundaries.len());
    for rec in &boundaries.records {
        index.entry(tier.key(&rec.path)).or_default().push(rec);
    }
    let ambiguous = index.values().filter(|v| v.len() > 1).count();
    if ambiguous > 0 {
        debug!(%tier, ambiguous, "boundary keys shared by several units");
    }

    population
        .iter()
        .map(|row| match index.get(&tier.key(&row.path)).map(Vec::as_slice) {
            Some([only]) => Some(*only),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub record: PopulationRecord,
    /// Boundary identifier, `None` when no tier matched.
    pub id: Option<String>,
    /// Tier that produced `id`.
    pub tier: Option<Tier>,
    pub area_sqm: Option<f64>,
    /// Derived density, when the table carries one.
    pub density: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTable {
    pub name: String,
    pub level: AdminLevel,
    pub metric_names: Vec<String>,
    /// Name of the density column, once derived.
    pub density_column: Option<String>,
    pub records: Vec<ResolvedRecord>,
}

impl ResolvedTable {
    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_names.iter().position(|m| m == name)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &ResolvedRecord> {
        self.records.iter().filter(|r| r.id.is_none())
    }

    pub fn resolved_count(&self) -> usize {
        self.records.iter().filter(|r| r.id.is_some()).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.records.len() - self.resolved_count()
    }

    pub fn tier_counts(&self) -> BTreeMap<Tier, usize> {
        let mut counts = BTreeMap::new();
        for tier in self.records.iter().filter_map(|r| r.tier) {
            *counts.entry(tier).or_insert(0) += 1;
        }
        counts
    }
}

/// Attach a boundary identifier and area to every population row.
///
/// Rows are kept one to one; a row no tier matches keeps `id == None`.
#[tracing::instrument(level = "info", skip_all, fields(table = %population.name, rows = population.len()))]
pub fn resolve_identifiers(
    population: PopulationTable,
    boundaries: &BoundaryTable,
) -> Result<ResolvedTable, ReconcileError> {
    if population.level != boundaries.level {
        return Err(ReconcileError::LevelMismatch {
            expected: boundaries.level,
            found: population.level,
        });
    }

    // 1) four independent left joins
    let joins: Vec<Vec<Option<&BoundaryRecord>>> = Tier::CASCADE
        .par_iter()
        .map(|&tier| left_join(tier, &population.records, boundaries))
        .collect();

    // 2) coalesce, first tier wins
    let records: Vec<ResolvedRecord> = population
        .records
        .into_iter()
        .enumerate()
        .map(|(row, record)| {
            let hits = Tier::CASCADE
                .iter()
                .zip(&joins)
                .filter_map(|(&tier, join)| join[row].map(|b| (tier, b)));
            let mut id = None;
            let mut tier = None;
            let mut area_sqm = None;
            for (t, b) in hits {
                if id.is_none() {
                    id = Some(b.id.clone());
                    tier = Some(t);
                }
                if area_sqm.is_none() {
                    area_sqm = b.area_sqm;
                }
            }
            ResolvedRecord {
                record,
                id,
                tier,
                area_sqm,
                density: None,
            }
        })
        .collect();

    let table = ResolvedTable {
        name: population.name,
        level: population.level,
        metric_names: population.metric_names,
        density_column: None,
        records,
    };

    for row in table.unresolved() {
        warn!(table = %table.name, line = row.record.line, unit = %row.record.path, "no boundary at any tier");
    }
    info!(
        table = %table.name,
        resolved = table.resolved_count(),
        unresolved = table.unresolved_count(),
        tiers = ?table.tier_counts(),
        "identifiers resolved"
    );
    Ok(table)
}
