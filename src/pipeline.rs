// src/pipeline.rs
//! The batch run, stage by stage.
//!
//! ```text
//! gazetteer ─┬─ districts ─ reconcile ─ measure ─ write ─ youth sheet ─ resolve ─ density ─ export
//!            └─ wards ───── reconcile ─ measure ─ write ─ population / household sheets ─ ...
//! ```
//!
//! The district and ward chains share nothing but the gazetteer districts and
//! run side by side.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tracing::{info, warn};

use crate::boundary::{reconcile_boundaries, BoundaryRecord, BoundaryTable, CuratedReader, Gazetteer};
use crate::census::{read_sheet, CensusKind, CensusNames};
use crate::config::{PipelineConfig, SheetConfig};
use crate::correct::Corrections;
use crate::error::ReconcileError;
use crate::export::{export_table, write_atomically, write_boundaries};
use crate::geo::{read_collection, Crs};
use crate::metrics::{measure_area, with_density};
use crate::names::{AdminLevel, NameKey, NameNormalizer};
use crate::population::{resolve_identifiers, ResolvedTable};

pub const SUMMARY_FILE: &str = "run_summary.json";

#[derive(Debug, Clone, Serialize)]
pub struct BoundarySummary {
    pub level: AdminLevel,
    pub units: usize,
    pub curated: usize,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub level: AdminLevel,
    pub rows: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Rows resolved per tier, keyed `tier_1` .. `tier_4`.
    pub tiers: BTreeMap<String, usize>,
    pub files: Vec<PathBuf>,
}

impl TableSummary {
    fn new(table: &ResolvedTable, files: Vec<PathBuf>) -> Self {
        Self {
            name: table.name.clone(),
            level: table.level,
            rows: table.records.len(),
            resolved: table.resolved_count(),
            unresolved: table.unresolved_count(),
            tiers: table
                .tier_counts()
                .into_iter()
                .map(|(t, n)| (format!("tier_{}", t.number()), n))
                .collect(),
            files,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub boundaries: Vec<BoundarySummary>,
    pub tables: Vec<TableSummary>,
}

impl RunSummary {
    pub fn unresolved_total(&self) -> usize {
        self.tables.iter().map(|t| t.unresolved).sum()
    }
}

/// Outputs of one level's chain.
struct LevelOutcome {
    boundary: BoundarySummary,
    tables: Vec<TableSummary>,
}

/// One configured run. Exception tables are compiled on construction, so a
/// conflicting table fails before any stage starts.
pub struct Pipeline {
    config: PipelineConfig,
    corrections: Corrections,
    normalizer: NameNormalizer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let corrections = match &config.corrections {
            Some(path) => Corrections::load(path)?,
            None => Corrections::builtin()?,
        };
        Ok(Self {
            config,
            corrections,
            normalizer: NameNormalizer::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn gazetteer(&self) -> Gazetteer<'_> {
        Gazetteer::new(
            self.normalizer,
            &self.corrections.gazetteer,
            &self.config.country_gid,
        )
    }

    fn target_city(&self) -> NameKey {
        let body = self.normalizer.body(&self.config.target_city);
        NameKey::new(self.corrections.gazetteer.correct(AdminLevel::City, &body))
    }

    fn sheet(&self, kind: CensusKind) -> &SheetConfig {
        match kind {
            CensusKind::WardPopulation => &self.config.census.ward_population,
            CensusKind::DistrictYouth => &self.config.census.district_youth,
            CensusKind::WardHousehold => &self.config.census.ward_household,
        }
    }

    /// Gazetteer districts of the national scope, with the file's CRS.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn gazetteer_districts(&self) -> Result<(Crs, Vec<BoundaryRecord>)> {
        let fc = read_collection(&self.config.gazetteer.district)?;
        let crs = Gazetteer::crs_of(&fc);
        let records = self
            .gazetteer()
            .districts(fc)
            .with_context(|| format!("reading {}", self.config.gazetteer.district.display()))?;
        Ok((crs, records))
    }

    /// Reconciled, measured boundary table for `level`.
    #[tracing::instrument(level = "info", skip(self, level, districts), fields(%level))]
    pub fn boundaries(
        &self,
        level: AdminLevel,
        crs: Crs,
        districts: &[BoundaryRecord],
    ) -> Result<BoundaryTable> {
        // 1) gazetteer units of the level
        let (crs, gazetteer) = match level {
            AdminLevel::District => (crs, districts.to_vec()),
            AdminLevel::Ward => {
                let path = &self.config.gazetteer.ward;
                let fc = read_collection(path)?;
                let crs = Gazetteer::crs_of(&fc);
                let wards = self
                    .gazetteer()
                    .wards(fc, districts)
                    .with_context(|| format!("reading {}", path.display()))?;
                (crs, wards)
            }
            AdminLevel::City => return Err(ReconcileError::UnsupportedLevel { level }.into()),
        };

        // 2) curated polygons, in the gazetteer's CRS
        let curated_path = match level {
            AdminLevel::Ward => &self.config.curated.ward,
            _ => &self.config.curated.district,
        };
        let reader = CuratedReader::new(*self.normalizer.vocab(), &self.config.curated);
        let curated = reader
            .read(level, read_collection(curated_path)?, crs)
            .with_context(|| format!("reading {}", curated_path.display()))?;

        // 3) merge, then measure
        let table = reconcile_boundaries(level, crs, &self.target_city(), gazetteer, curated)?;
        Ok(measure_area(table)?)
    }

    /// Census sheet `kind` resolved against `boundaries`, density attached.
    #[tracing::instrument(level = "info", skip(self, boundaries))]
    pub fn population(&self, kind: CensusKind, boundaries: &BoundaryTable) -> Result<ResolvedTable> {
        let sheet = self.sheet(kind);
        let names = CensusNames::new(self.normalizer, &self.corrections.census);
        let population = read_sheet(kind, &sheet.path, sheet.layout.as_ref(), &names)?;
        let resolved = resolve_identifiers(population, boundaries)?;
        match kind.density() {
            Some(spec) => Ok(with_density(resolved, spec.source, spec.column)?),
            None => Ok(resolved),
        }
    }

    fn level_chain(
        &self,
        level: AdminLevel,
        crs: Crs,
        districts: &[BoundaryRecord],
    ) -> Result<LevelOutcome> {
        let out_dir = &self.config.output_dir;
        let table = self.boundaries(level, crs, districts)?;
        let file = write_boundaries(out_dir, &table)?;
        let boundary = BoundarySummary {
            level,
            units: table.len(),
            curated: table.curated_count(),
            file,
        };

        let mut tables = Vec::new();
        for kind in CensusKind::ALL.into_iter().filter(|k| k.level() == level) {
            let resolved = self.population(kind, &table)?;
            let files = export_table(out_dir, &resolved, self.config.write_parquet)?;
            tables.push(TableSummary::new(&resolved, files));
        }
        Ok(LevelOutcome { boundary, tables })
    }

    /// Run every stage and write all outputs plus `run_summary.json`.
    pub fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let out_dir = &self.config.output_dir;
        fs::create_dir_all(out_dir)
            .with_context(|| format!("creating output directory {}", out_dir.display()))?;

        // 1) shared gazetteer districts
        let (crs, districts) = self.gazetteer_districts()?;

        // 2) district and ward chains side by side
        let (district, ward) = rayon::join(
            || self.level_chain(AdminLevel::District, crs, &districts),
            || self.level_chain(AdminLevel::Ward, crs, &districts),
        );
        let (district, ward) = (district?, ward?);

        // 3) summary
        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            boundaries: vec![district.boundary, ward.boundary],
            tables: district.tables.into_iter().chain(ward.tables).collect(),
        };
        let summary_path = out_dir.join(SUMMARY_FILE);
        write_atomically(&summary_path, |file| {
            let mut w = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut w, &summary).context("serializing run summary")?;
            w.write_all(b"\n")?;
            w.flush()?;
            Ok(())
        })?;
        info!(
            tables = summary.tables.len(),
            unresolved = summary.unresolved_total(),
            elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
            "run complete"
        );

        if self.config.fail_on_unresolved {
            if let Some(t) = summary.tables.iter().find(|t| t.unresolved > 0) {
                warn!(table = %t.name, "unresolved rows and fail_on_unresolved is set");
                return Err(ReconcileError::Unresolved {
                    table: t.name.clone(),
                    count: t.unresolved,
                }
                .into());
            }
        }
        Ok(summary)
    }
}
