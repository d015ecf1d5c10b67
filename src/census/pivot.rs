// src/census/pivot.rs
//! Pivot-sheet reader.
//!
//! Census workbooks are exported as CSV with the pivot's shape intact: a
//! couple of banner rows, one or two header rows (group / sub-column), the
//! group-by columns printed only when they change, and subtotal rows marked
//! with `Tổng số`.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use tracing::{debug, trace};

use crate::error::ReconcileError;

fn default_skip_rows() -> usize {
    2
}

fn default_fill_columns() -> Vec<usize> {
    vec![0, 1]
}

fn default_marker() -> String {
    "Tổng số".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PivotLayout {
    /// Banner lines above the header, blank lines included.
    #[serde(default = "default_skip_rows")]
    pub skip_rows: usize,
    /// 1 for flat headers, 2 for (group, sub-column) headers.
    pub header_rows: usize,
    /// Group-by columns that are blank until their value changes.
    #[serde(default = "default_fill_columns")]
    pub fill_columns: Vec<usize>,
    /// Columns scanned for the subtotal marker.
    pub marker_columns: Vec<usize>,
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl PivotLayout {
    pub fn new(header_rows: usize, marker_columns: Vec<usize>) -> Self {
        Self {
            skip_rows: default_skip_rows(),
            header_rows,
            fill_columns: default_fill_columns(),
            marker_columns,
            marker: default_marker(),
        }
    }
}

/// Header of one column. `sub` is empty for single-row headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLabel {
    pub group: String,
    pub sub: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    /// 1-based line in the source file.
    pub line: usize,
    pub cells: Vec<String>,
}

impl PivotRow {
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    /// Blank and `-` cells are null; anything else must be a number.
    pub fn number(&self, column: usize) -> Result<Option<f64>, ReconcileError> {
        parse_number(self.cell(column)).map_err(|value| ReconcileError::BadNumber {
            row: self.line,
            column,
            value,
        })
    }

    /// Sum of `columns`, skipping nulls; null when every cell is null.
    pub fn sum(&self, columns: &[usize]) -> Result<Option<f64>, ReconcileError> {
        let mut total: Option<f64> = None;
        for &c in columns {
            if let Some(v) = self.number(c)? {
                total = Some(total.unwrap_or(0.0) + v);
            }
        }
        Ok(total)
    }
}

fn parse_number(raw: &str) -> Result<Option<f64>, String> {
    let t = raw.trim();
    if t.is_empty() || t == "-" {
        return Ok(None);
    }
    // thousands separators as spreadsheets print them
    let digits: String = t
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}'))
        .collect();
    digits.parse::<f64>().map(Some).map_err(|_| t.to_string())
}

/// A flattened pivot: labelled columns and data rows with subtotals removed.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub columns: Vec<ColumnLabel>,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    /// Column positions under group `label`, left to right.
    pub fn group_columns(&self, label: &str) -> Result<Vec<usize>, ReconcileError> {
        let cols: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.group == label)
            .map(|(i, _)| i)
            .collect();
        if cols.is_empty() {
            return Err(ReconcileError::MissingColumnGroup {
                label: label.to_string(),
            });
        }
        Ok(cols)
    }

    /// Like [`group_columns`](Self::group_columns), but insists on at least
    /// `needed` columns.
    pub fn group_at_least(&self, label: &str, needed: usize) -> Result<Vec<usize>, ReconcileError> {
        let cols = self.group_columns(label)?;
        if cols.len() < needed {
            return Err(ReconcileError::NarrowColumnGroup {
                label: label.to_string(),
                width: cols.len(),
                needed,
            });
        }
        Ok(cols)
    }
}

/// Read a pivot export laid out as `layout`.
pub fn read_pivot<R: Read>(reader: R, layout: &PivotLayout) -> Result<PivotTable> {
    // 1) banner, by physical line: the CSV reader drops empty lines
    let mut input = BufReader::new(reader);
    let mut banner = Vec::new();
    for skipped in 0..layout.skip_rows {
        banner.clear();
        if input.read_until(b'\n', &mut banner).context("reading banner")? == 0 {
            debug!(skipped, "sheet ends inside its banner");
            break;
        }
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut header_lines: Vec<Vec<String>> = Vec::with_capacity(layout.header_rows);
    let mut rows: Vec<PivotRow> = Vec::new();
    let mut fill: Vec<String> = vec![String::new(); layout.fill_columns.len()];
    let mut subtotals = 0usize;

    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        let line = layout.skip_rows
            + record.position().map(|p| p.line() as usize).unwrap_or(idx + 1);
        let mut cells: Vec<String> = record.iter().map(|s| s.trim().to_string()).collect();

        // 2) header rows
        if header_lines.len() < layout.header_rows {
            header_lines.push(cells);
            continue;
        }
        if cells.iter().all(String::is_empty) {
            continue;
        }

        // 3) forward-fill the group-by columns
        for (slot, &col) in fill.iter_mut().zip(&layout.fill_columns) {
            if col >= cells.len() {
                cells.resize(col + 1, String::new());
            }
            if cells[col].is_empty() {
                cells[col] = slot.clone();
            } else {
                *slot = cells[col].clone();
            }
        }

        // 4) drop subtotal rows
        let is_subtotal = layout
            .marker_columns
            .iter()
            .any(|&c| cells.get(c).is_some_and(|v| v.contains(&layout.marker)));
        if is_subtotal {
            trace!(line, "subtotal row dropped");
            subtotals += 1;
            continue;
        }
        rows.push(PivotRow { line, cells });
    }

    let columns = column_labels(&header_lines);
    debug!(
        columns = columns.len(),
        rows = rows.len(),
        subtotals,
        "pivot sheet flattened"
    );
    Ok(PivotTable { columns, rows })
}

/// Blank group cells inherit the group to their left (merged header cells
/// export their text into the first column only).
fn column_labels(header_lines: &[Vec<String>]) -> Vec<ColumnLabel> {
    let width = header_lines.iter().map(Vec::len).max().unwrap_or(0);
    let top = header_lines.first();
    let sub = header_lines.get(1);

    let mut group = String::new();
    (0..width)
        .map(|i| {
            let raw = top.and_then(|r| r.get(i)).map(String::as_str).unwrap_or("");
            if sub.is_none() {
                return ColumnLabel {
                    group: raw.to_string(),
                    sub: String::new(),
                };
            }
            if !raw.is_empty() {
                group = raw.to_string();
            }
            ColumnLabel {
                group: group.clone(),
                sub: sub
                    .and_then(|r| r.get(i))
                    .cloned()
                    .unwrap_or_default(),
            }
        })
        .collect()
}
