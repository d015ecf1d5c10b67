// src/export.rs
//! Flat-file outputs: boundary GeoJSON, population tables as CSV and
//! Parquet, and the unresolved-row report.
//!
//! Every file is written to a dot-prefixed tmp file next to its target and
//! renamed into place once complete.

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use geojson::{Feature, FeatureCollection};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::{json, Map};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

use crate::boundary::{BoundaryRecord, BoundaryTable};
use crate::geo::{areal_feature, declare_crs, write_collection};
use crate::names::{AdminLevel, AdminPath};
use crate::population::{ResolvedRecord, ResolvedTable};

/// Run `write` against a tmp file beside `path`, then rename it over `path`.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no file name in {}", path.display()))?;
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let tmp = File::create(&tmp_path).with_context(|| format!("creating {}", tmp_path.display()))?;
    if let Err(e) = write(tmp) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}

pub fn boundary_file_name(level: AdminLevel) -> String {
    format!("VN_Boundaries_{}.json", level.label())
}

/// Name columns of a level, in export order.
fn name_columns(level: AdminLevel) -> Vec<&'static str> {
    match level {
        AdminLevel::Ward => vec![
            "city",
            "district",
            "ward",
            "city_title",
            "dist_title",
            "ward_title",
        ],
        _ => vec!["city", "district", "city_title", "dist_title"],
    }
}

fn name_values(path: &AdminPath) -> Vec<&str> {
    let mut names = vec![
        path.city.name.native.as_str(),
        path.district.name.native.as_str(),
    ];
    let mut titles = vec![
        path.city.title.native.as_str(),
        path.district.title.native.as_str(),
    ];
    if let Some(ward) = &path.ward {
        names.push(ward.name.native.as_str());
        titles.push(ward.title.native.as_str());
    }
    names.extend(titles);
    names
}

fn boundary_feature(rec: &BoundaryRecord) -> Feature {
    let p = &rec.path;
    let mut props = Map::new();
    props.insert("city".into(), json!(p.city.name.native));
    props.insert("city_en".into(), json!(p.city.name.translit));
    props.insert("dist_id".into(), json!(rec.district_id));
    props.insert("district".into(), json!(p.district.name.native));
    props.insert("dist_title".into(), json!(p.district.title.native));
    props.insert("dist_en".into(), json!(p.district.name.translit));
    props.insert("dist_title_en".into(), json!(p.district.title.translit));
    if let Some(ward) = &p.ward {
        props.insert("ward_id".into(), json!(rec.id));
        props.insert("ward".into(), json!(ward.name.native));
        props.insert("ward_title".into(), json!(ward.title.native));
        props.insert("ward_en".into(), json!(ward.name.translit));
        props.insert("ward_title_en".into(), json!(ward.title.translit));
    }
    if let Some(area) = rec.area_sqm {
        props.insert("area_sqm".into(), json!(area));
    }
    props.insert("source".into(), json!(rec.origin));
    areal_feature(props, &rec.geometry)
}

/// Write `VN_Boundaries_<Level>.json` into `dir`.
pub fn write_boundaries(dir: &Path, table: &BoundaryTable) -> Result<PathBuf> {
    let path = dir.join(boundary_file_name(table.level));
    let mut fc: FeatureCollection = table.records.iter().map(boundary_feature).collect();
    declare_crs(&mut fc, table.crs);
    write_collection(&path, &fc)?;
    info!(path = %path.display(), units = table.len(), "boundaries written");
    Ok(path)
}

fn fmt_num(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Column names of a resolved table, in export order.
pub fn table_columns(table: &ResolvedTable) -> Vec<String> {
    let mut cols = vec![format!("{}_id", table.level.column_prefix())];
    cols.extend(name_columns(table.level).into_iter().map(String::from));
    cols.push("area_sqm".into());
    cols.extend(table.metric_names.iter().cloned());
    if let Some(d) = &table.density_column {
        cols.push(d.clone());
    }
    cols.push("match_tier".into());
    cols
}

fn table_row(table: &ResolvedTable, row: &ResolvedRecord) -> Vec<String> {
    let mut out = vec![row.id.clone().unwrap_or_default()];
    out.extend(name_values(&row.record.path).into_iter().map(String::from));
    out.push(fmt_num(row.area_sqm));
    out.extend(row.record.metrics.iter().map(|m| fmt_num(*m)));
    if table.density_column.is_some() {
        out.push(row.density.map(|d| d.to_string()).unwrap_or_default());
    }
    out.push(row.tier.map(|t| t.to_string()).unwrap_or_default());
    out
}

pub fn write_table_csv(path: &Path, table: &ResolvedTable) -> Result<()> {
    write_atomically(path, |file| {
        let mut w = csv::Writer::from_writer(file);
        w.write_record(table_columns(table))?;
        for row in &table.records {
            w.write_record(table_row(table, row))?;
        }
        w.flush()?;
        Ok(())
    })
    .with_context(|| format!("writing {}", path.display()))
}

/// Rows no tier resolved, with the keys each tier tried.
pub fn write_unresolved_csv(path: &Path, table: &ResolvedTable) -> Result<usize> {
    let mut count = 0usize;
    write_atomically(path, |file| {
        let mut w = csv::Writer::from_writer(file);
        let mut header = vec!["line".to_string()];
        header.extend(name_columns(table.level).into_iter().map(String::from));
        header.extend(["city_en", "dist_en"].map(String::from));
        if table.level == AdminLevel::Ward {
            header.push("ward_en".into());
        }
        w.write_record(&header)?;

        for row in table.unresolved() {
            let p = &row.record.path;
            let mut rec = vec![row.record.line.to_string()];
            rec.extend(name_values(p).into_iter().map(String::from));
            rec.push(p.city.name.translit.clone());
            rec.push(p.district.name.translit.clone());
            if let Some(ward) = &p.ward {
                rec.push(ward.name.translit.clone());
            }
            w.write_record(&rec)?;
            count += 1;
        }
        w.flush()?;
        Ok(())
    })
    .with_context(|| format!("writing {}", path.display()))?;
    Ok(count)
}

fn table_batch(table: &ResolvedTable) -> Result<RecordBatch> {
    let mut fields = vec![Field::new(
        format!("{}_id", table.level.column_prefix()),
        DataType::Utf8,
        true,
    )];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(
        table.records.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
    ))];

    for (i, name) in name_columns(table.level).into_iter().enumerate() {
        fields.push(Field::new(name, DataType::Utf8, false));
        columns.push(Arc::new(StringArray::from_iter_values(
            table.records.iter().map(|r| name_values(&r.record.path)[i]),
        )));
    }

    fields.push(Field::new("area_sqm", DataType::Float64, true));
    columns.push(Arc::new(Float64Array::from(
        table.records.iter().map(|r| r.area_sqm).collect::<Vec<_>>(),
    )));

    for (m, name) in table.metric_names.iter().enumerate() {
        fields.push(Field::new(name, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(
            table
                .records
                .iter()
                .map(|r| r.record.metrics.get(m).copied().flatten())
                .collect::<Vec<_>>(),
        )));
    }

    if let Some(d) = &table.density_column {
        fields.push(Field::new(d, DataType::Int64, true));
        columns.push(Arc::new(Int64Array::from(
            table.records.iter().map(|r| r.density).collect::<Vec<_>>(),
        )));
    }

    fields.push(Field::new("match_tier", DataType::UInt8, true));
    columns.push(Arc::new(UInt8Array::from(
        table
            .records
            .iter()
            .map(|r| r.tier.map(|t| t.number()))
            .collect::<Vec<_>>(),
    )));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .with_context(|| format!("building record batch for {}", table.name))
}

pub fn write_table_parquet(path: &Path, table: &ResolvedTable) -> Result<()> {
    let batch = table_batch(table)?;
    write_atomically(path, |file| {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("creating Arrow writer")?;
        writer.write(&batch).context("writing batch")?;
        writer.close().context("closing writer")?;
        Ok(())
    })
    .with_context(|| format!("writing {}", path.display()))
}

/// Every artifact of one population table; returns the paths written.
#[tracing::instrument(level = "info", skip_all, fields(table = %table.name))]
pub fn export_table(dir: &Path, table: &ResolvedTable, parquet: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(3);

    let csv_path = dir.join(format!("{}.csv", table.name));
    write_table_csv(&csv_path, table)?;
    written.push(csv_path);

    if parquet {
        let pq_path = dir.join(format!("{}.parquet", table.name));
        write_table_parquet(&pq_path, table)?;
        written.push(pq_path);
    }

    let unresolved_path = dir.join(format!("{}_unresolved.csv", table.name));
    let unresolved = write_unresolved_csv(&unresolved_path, table)?;
    written.push(unresolved_path);

    debug!(files = written.len(), unresolved, "table exported");
    Ok(written)
}
