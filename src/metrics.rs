// src/metrics.rs
//! Area and density.

use geo::Area;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::boundary::BoundaryTable;
use crate::error::ReconcileError;
use crate::geo::{Crs, Reprojection};
use crate::population::ResolvedTable;

/// Cache every record's area in m², measured in the equal-area projection.
/// Display geometry stays in the table's own CRS.
#[tracing::instrument(level = "info", skip_all, fields(level = %table.level, units = table.len()))]
pub fn measure_area(mut table: BoundaryTable) -> Result<BoundaryTable, ReconcileError> {
    let from = table.crs;
    table
        .records
        .par_iter_mut()
        .map_init(
            || Reprojection::new(from, Crs::EqualArea),
            |proj, rec| {
                let proj = proj.as_ref().map_err(Clone::clone)?;
                rec.area_sqm = Some(proj.apply(&rec.geometry)?.unsigned_area());
                Ok(())
            },
        )
        .collect::<Result<(), ReconcileError>>()?;
    let total: f64 = table.records.iter().filter_map(|r| r.area_sqm).sum();
    info!(total_km2 = total / 1e6, "areas measured");
    Ok(table)
}

/// People per km², rounded half to even. Missing or non-positive areas have
/// no density.
pub fn density(count: Option<f64>, area_sqm: Option<f64>) -> Option<i64> {
    match (count, area_sqm) {
        (Some(c), Some(a)) if a > 0.0 => Some((c / a * 1e6).round_ties_even() as i64),
        _ => None,
    }
}

/// Derive `column` from metric `source` and each row's resolved area.
pub fn with_density(
    mut table: ResolvedTable,
    source: &str,
    column: &str,
) -> Result<ResolvedTable, ReconcileError> {
    let idx = table
        .metric_index(source)
        .ok_or_else(|| ReconcileError::MissingColumnGroup {
            label: source.to_string(),
        })?;
    for row in table.records.iter_mut() {
        row.density = density(row.record.metrics[idx], row.area_sqm);
    }
    let derived = table.records.iter().filter(|r| r.density.is_some()).count();
    debug!(table = %table.name, column, derived, "density derived");
    table.density_column = Some(column.to_string());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::fixtures::district;
    use crate::names::AdminLevel;
    use geo::{polygon, MultiPolygon};
    use crate::population::{PopulationRecord, ResolvedRecord};

    #[test]
    fn density_per_square_kilometre() {
        assert_eq!(density(Some(5000.0), Some(2_000_000.0)), Some(2500));
        assert_eq!(density(Some(5000.0), None), None);
        assert_eq!(density(None, Some(2_000_000.0)), None);
        assert_eq!(density(Some(5000.0), Some(0.0)), None);
        assert_eq!(density(Some(5000.0), Some(-1.0)), None);
    }

    #[test]
    fn density_ties_round_to_even() {
        // 2.5 and 3.5 people per km²
        assert_eq!(density(Some(5.0), Some(2_000_000.0)), Some(2));
        assert_eq!(density(Some(7.0), Some(2_000_000.0)), Some(4));
        assert_eq!(density(Some(7.2), Some(2_000_000.0)), Some(4));
    }

    #[test]
    fn one_degree_cell_at_the_equator() {
        let cell = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]]);
        let mut rec = district("D", "X", "Huyện", "Y");
        rec.geometry = cell.clone();
        let table = BoundaryTable::new(AdminLevel::District, Crs::Wgs84, vec![rec]).unwrap();
        let measured = measure_area(table).unwrap();
        let area = measured.records[0].area_sqm.unwrap();
        // ≈ 12 308 km² on the WGS 84 ellipsoid
        assert!((area / 1e6 - 12_308.0).abs() < 15.0, "area {} km²", area / 1e6);
        // display geometry is untouched
        assert_eq!(measured.records[0].geometry, cell);
    }

    #[test]
    fn unprojectable_geometry_fails_the_measurement() {
        let mut rec = district("D", "X", "Huyện", "Y");
        rec.geometry = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 120.0),
        ]]);
        let table = BoundaryTable::new(AdminLevel::District, Crs::Wgs84, vec![rec]).unwrap();
        assert!(matches!(
            measure_area(table),
            Err(ReconcileError::Projection { .. })
        ));
    }

    #[test]
    fn with_density_uses_the_named_metric() {
        let base = district("D", "X", "Huyện", "Y");
        let row = |total: f64, area: Option<f64>| ResolvedRecord {
            record: PopulationRecord {
                line: 1,
                path: base.path.clone(),
                metrics: vec![Some(1.0), Some(total)],
            },
            id: area.map(|_| "D".to_string()),
            tier: None,
            area_sqm: area,
            density: None,
        };
        let table = ResolvedTable {
            name: "t".into(),
            level: AdminLevel::District,
            metric_names: vec!["urban".into(), "total".into()],
            density_column: None,
            records: vec![row(5000.0, Some(2_000_000.0)), row(5000.0, None)],
        };

        let out = with_density(table.clone(), "total", "pop_density").unwrap();
        assert_eq!(out.density_column.as_deref(), Some("pop_density"));
        assert_eq!(out.records[0].density, Some(2500));
        assert_eq!(out.records[1].density, None);

        assert!(with_density(table, "missing", "x").is_err());
    }
}
