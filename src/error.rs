//! Domain failures of the reconciliation pipeline.
//!
//! I/O and orchestration errors travel as `anyhow::Error`; the conditions
//! below are the ones a caller may want to match on.

use thiserror::Error;

use crate::geo::Crs;
use crate::names::AdminLevel;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("exception table `{table}` maps `{key}` to both `{first}` and `{second}`")]
    ConflictingException {
        table: String,
        key: String,
        first: String,
        second: String,
    },

    #[error("{count} curated {level} unit(s) have no gazetteer counterpart: {units:?}")]
    UnmatchedCurated {
        level: AdminLevel,
        count: usize,
        units: Vec<String>,
    },

    #[error("curated {level} unit `{key}` matches several gazetteer units: {candidates:?}")]
    AmbiguousCurated {
        level: AdminLevel,
        key: String,
        candidates: Vec<String>,
    },

    #[error("gazetteer {level} unit `{id}` is matched by more than one curated unit")]
    DuplicateCurated { level: AdminLevel, id: String },

    #[error("{level} boundary key `{key}` appears on units {ids:?}")]
    DuplicateBoundary {
        level: AdminLevel,
        key: String,
        ids: Vec<String>,
    },

    #[error("feature {index} has no usable `{property}` property")]
    MissingProperty { index: usize, property: String },

    #[error("feature {index}: {reason}")]
    BadGeometry { index: usize, reason: String },

    #[error("pivot sheet has no column group `{label}`")]
    MissingColumnGroup { label: String },

    #[error("pivot group `{label}` has {width} columns, needs {needed}")]
    NarrowColumnGroup {
        label: String,
        width: usize,
        needed: usize,
    },

    #[error("row {row}, column {column}: `{value}` is not a number")]
    BadNumber {
        row: usize,
        column: usize,
        value: String,
    },

    #[error("expected {expected}-level records, found {found}-level")]
    LevelMismatch {
        expected: AdminLevel,
        found: AdminLevel,
    },

    #[error("{level} is not a reconciliation level")]
    UnsupportedLevel { level: AdminLevel },

    #[error("unsupported coordinate reference system `{0}`")]
    UnsupportedCrs(String),

    #[error("cannot reproject {from} -> {to}: {reason}")]
    Projection { from: Crs, to: Crs, reason: String },

    #[error("{count} {table} row(s) matched no boundary at any tier")]
    Unresolved { table: String, count: usize },
}
