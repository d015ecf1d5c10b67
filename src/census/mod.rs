// src/census/mod.rs
//! Census sheets: from pivot exports to flat, normalized population tables.

pub mod pivot;

pub use pivot::{read_pivot, ColumnLabel, PivotLayout, PivotRow, PivotTable};

use anyhow::{Context, Result};
use std::{fs::File, io::BufReader, io::Read, path::Path};
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::correct::Corrector;
use crate::error::ReconcileError;
use crate::names::{AdminLevel, AdminName, AdminPath, NameNormalizer};
use crate::population::{PopulationRecord, PopulationTable};

const URBAN: &str = "1. Thành thị";
const RURAL: &str = "2. Nông thôn";

/// The three published sheets the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CensusKind {
    /// Population by ward, urban/rural split.
    WardPopulation,
    /// Population by district and age bracket, urban/rural groups.
    DistrictYouth,
    /// Households by ward and household size, urban/rural groups.
    WardHousehold,
}

/// Source metric and output column of a density.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensitySpec {
    pub source: &'static str,
    pub column: &'static str,
}

impl CensusKind {
    pub const ALL: [CensusKind; 3] = [
        CensusKind::WardPopulation,
        CensusKind::DistrictYouth,
        CensusKind::WardHousehold,
    ];

    pub fn level(self) -> AdminLevel {
        match self {
            CensusKind::DistrictYouth => AdminLevel::District,
            CensusKind::WardPopulation | CensusKind::WardHousehold => AdminLevel::Ward,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            CensusKind::WardPopulation => "VN_Population_ward",
            CensusKind::DistrictYouth => "VN_YoungPop_dist",
            CensusKind::WardHousehold => "VN_HouseholdPop_ward",
        }
    }

    pub fn metric_names(self) -> &'static [&'static str] {
        match self {
            CensusKind::WardPopulation => &["total", "urban", "rural"],
            CensusKind::DistrictYouth => &["urban_15_34", "rural_15_34", "total_15_34"],
            CensusKind::WardHousehold => &[
                "urban_1", "urban_2", "urban_3", "urban_4", "urban_5", "rural_1_2", "rural_3",
                "rural_4", "rural_5",
            ],
        }
    }

    pub fn density(self) -> Option<DensitySpec> {
        match self {
            CensusKind::WardPopulation => Some(DensitySpec {
                source: "total",
                column: "pop_density",
            }),
            CensusKind::DistrictYouth => Some(DensitySpec {
                source: "total_15_34",
                column: "dense_15_34",
            }),
            CensusKind::WardHousehold => None,
        }
    }

    pub fn default_layout(self) -> PivotLayout {
        match self {
            CensusKind::WardPopulation => PivotLayout::new(1, vec![0, 1, 2]),
            CensusKind::DistrictYouth => PivotLayout::new(2, vec![0, 1]),
            CensusKind::WardHousehold => PivotLayout::new(2, vec![0, 1, 2]),
        }
    }

    /// Number of leading name columns (city, district[, ward]).
    fn name_columns(self) -> usize {
        self.level().depth() as usize
    }

    /// Positions each metric is computed from.
    fn plan(self, table: &PivotTable) -> Result<Vec<Vec<usize>>, ReconcileError> {
        let plan = match self {
            CensusKind::WardPopulation => vec![vec![3], vec![4], vec![5]],
            CensusKind::DistrictYouth => {
                // age brackets 4 to 7 of each group: 15-19 .. 30-34
                let urban = table.group_at_least(URBAN, 7)?;
                let rural = table.group_at_least(RURAL, 7)?;
                let total = [&urban[3..7], &rural[3..7]].concat();
                vec![urban[3..7].to_vec(), rural[3..7].to_vec(), total]
            }
            CensusKind::WardHousehold => {
                let urban = table.group_at_least(URBAN, 5)?;
                let rural = table.group_at_least(RURAL, 5)?;
                vec![
                    vec![urban[0]],
                    vec![urban[1]],
                    vec![urban[2]],
                    vec![urban[3]],
                    urban[4..].to_vec(),
                    rural[0..2].to_vec(),
                    vec![rural[2]],
                    vec![rural[3]],
                    rural[4..].to_vec(),
                ]
            }
        };
        Ok(plan)
    }
}

/// Census-side identity: exception table on the printed cell, then
/// normalization with the title taken from the name itself.
pub struct CensusNames<'a> {
    normalizer: NameNormalizer,
    corrector: &'a Corrector,
}

impl<'a> CensusNames<'a> {
    pub fn new(normalizer: NameNormalizer, corrector: &'a Corrector) -> Self {
        Self {
            normalizer,
            corrector,
        }
    }

    pub fn name(&self, level: AdminLevel, raw: &str) -> AdminName {
        // exception keys are composed text; sheets sometimes are not
        let cell: String = raw.trim().nfc().collect();
        let fixed = self.corrector.correct(level, &cell);
        self.normalizer.normalize(fixed).into()
    }

    fn path(&self, kind: CensusKind, row: &PivotRow) -> AdminPath {
        AdminPath {
            city: self.name(AdminLevel::City, row.cell(0)),
            district: self.name(AdminLevel::District, row.cell(1)),
            ward: (kind.level() == AdminLevel::Ward).then(|| self.name(AdminLevel::Ward, row.cell(2))),
        }
    }
}

/// Flatten one sheet into a population table.
pub fn parse_sheet<R: Read>(
    kind: CensusKind,
    reader: R,
    layout: &PivotLayout,
    names: &CensusNames<'_>,
) -> Result<PopulationTable> {
    let table = read_pivot(reader, layout)?;
    let plan = kind.plan(&table)?;

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        if (0..kind.name_columns()).any(|c| row.cell(c).is_empty()) {
            warn!(line = row.line, "row with a blank name cell");
        }
        let metrics = plan
            .iter()
            .map(|cols| row.sum(cols))
            .collect::<Result<Vec<_>, _>>()?;
        records.push(PopulationRecord {
            line: row.line,
            path: names.path(kind, row),
            metrics,
        });
    }

    Ok(PopulationTable {
        name: kind.table_name().to_string(),
        level: kind.level(),
        metric_names: kind.metric_names().iter().map(|m| m.to_string()).collect(),
        records,
    })
}

/// Read the sheet at `path`; `layout` overrides the sheet's standard layout.
#[tracing::instrument(level = "info", skip(path, layout, names), fields(path = %path.as_ref().display()))]
pub fn read_sheet<P: AsRef<Path>>(
    kind: CensusKind,
    path: P,
    layout: Option<&PivotLayout>,
    names: &CensusNames<'_>,
) -> Result<PopulationTable> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening census sheet {}", path.display()))?;
    let layout = layout.cloned().unwrap_or_else(|| kind.default_layout());
    let table = parse_sheet(kind, BufReader::new(file), &layout, names)
        .with_context(|| format!("parsing census sheet {}", path.display()))?;
    info!(table = %table.name, rows = table.len(), "census sheet loaded");
    Ok(table)
}
