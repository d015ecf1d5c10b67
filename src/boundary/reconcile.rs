// src/boundary/reconcile.rs

use std::collections::HashMap;
use tracing::{info, warn};

use super::curated::{gazetteer_key, CuratedUnit};
use super::{BoundaryRecord, BoundaryTable, GeometrySource};
use crate::error::ReconcileError;
use crate::geo::Crs;
use crate::names::{AdminLevel, NameKey};

/// Merge gazetteer units of one level with the curated polygons of the target
/// city.
///
/// Every curated unit must match exactly one gazetteer unit of `target_city`
/// on its transliterated names, and no gazetteer unit may be claimed twice.
/// Matched units take the curated geometry and keep gazetteer attributes;
/// everything else passes through unchanged, in gazetteer order.
#[tracing::instrument(level = "info", skip(gazetteer, curated), fields(gazetteer = gazetteer.len(), curated = curated.len()))]
pub fn reconcile_boundaries(
    level: AdminLevel,
    crs: Crs,
    target_city: &NameKey,
    mut gazetteer: Vec<BoundaryRecord>,
    curated: Vec<CuratedUnit>,
) -> Result<BoundaryTable, ReconcileError> {
    if level == AdminLevel::City {
        return Err(ReconcileError::UnsupportedLevel { level });
    }

    // 1) index the target city's gazetteer units by their curated-join key
    let in_target = |r: &BoundaryRecord| r.path.city.name.native == target_city.native;
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, rec) in gazetteer.iter().enumerate().filter(|(_, r)| in_target(*r)) {
        index.entry(gazetteer_key(&rec.path)).or_default().push(i);
    }

    // 2) resolve every curated unit to exactly one gazetteer slot
    let mut claimed: Vec<Option<usize>> = vec![None; gazetteer.len()];
    let mut unmatched = Vec::new();
    for (c, unit) in curated.iter().enumerate() {
        let key = unit.key();
        match index.get(&key).map(Vec::as_slice) {
            None | Some([]) => unmatched.push(unit.label.clone()),
            Some([i]) => {
                if claimed[*i].is_some() {
                    return Err(ReconcileError::DuplicateCurated {
                        level,
                        id: gazetteer[*i].id.clone(),
                    });
                }
                claimed[*i] = Some(c);
            }
            Some(many) => {
                return Err(ReconcileError::AmbiguousCurated {
                    level,
                    key: unit.label.clone(),
                    candidates: many.iter().map(|&i| gazetteer[i].id.clone()).collect(),
                })
            }
        }
    }
    if !unmatched.is_empty() {
        return Err(ReconcileError::UnmatchedCurated {
            level,
            count: unmatched.len(),
            units: unmatched,
        });
    }

    // 3) swap geometries
    let mut curated: Vec<Option<CuratedUnit>> = curated.into_iter().map(Some).collect();
    let mut replaced = 0usize;
    for (rec, slot) in gazetteer.iter_mut().zip(&claimed) {
        match slot {
            Some(c) => {
                if let Some(unit) = curated[*c].take() {
                    rec.geometry = unit.geometry;
                    rec.origin = GeometrySource::Curated;
                    replaced += 1;
                }
            }
            None if in_target(rec) => {
                warn!(id = %rec.id, unit = %rec.path, "no curated polygon; keeping gazetteer geometry")
            }
            None => {}
        }
    }

    info!(%level, units = gazetteer.len(), replaced, "boundaries reconciled");
    BoundaryTable::new(level, crs, gazetteer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::fixtures::{district, square, ward};

    fn hcmc() -> NameKey {
        NameKey::new("HồChíMinh")
    }

    fn unit(district_key: &str, ward_key: Option<&str>, label: &str) -> CuratedUnit {
        CuratedUnit {
            label: label.to_string(),
            district_key: district_key.to_string(),
            ward_key: ward_key.map(str::to_string),
            geometry: square(106.0, 10.0, 0.5),
        }
    }

    fn districts() -> Vec<BoundaryRecord> {
        vec![
            district("VNM.25.1_1", "HồChíMinh", "Quận", "1"),
            district("VNM.25.20_1", "HồChíMinh", "ThànhPhố", "ThủĐức"),
            district("VNM.27.1_1", "HàNội", "Quận", "BaĐình"),
        ]
    }

    #[test]
    fn curated_geometry_replaces_gazetteer_geometry() {
        let table = reconcile_boundaries(
            AdminLevel::District,
            Crs::Wgs84,
            &hcmc(),
            districts(),
            vec![unit("thuduc", None, "Thu Duc")],
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.curated_count(), 1);
        let thu_duc = table.get("VNM.25.20_1").unwrap();
        assert_eq!(thu_duc.origin, GeometrySource::Curated);
        assert_eq!(thu_duc.geometry, square(106.0, 10.0, 0.5));
        // attributes stay gazetteer-derived
        assert_eq!(thu_duc.path.district.name.native, "ThủĐức");
        assert_eq!(thu_duc.path.district.title.native, "ThànhPhố");

        let ba_dinh = table.get("VNM.27.1_1").unwrap();
        assert_eq!(ba_dinh.origin, GeometrySource::Gazetteer);
        assert_eq!(ba_dinh.geometry, square(0.0, 0.0, 0.01));
    }

    #[test]
    fn units_outside_the_target_city_are_not_candidates() {
        let err = reconcile_boundaries(
            AdminLevel::District,
            Crs::Wgs84,
            &hcmc(),
            districts(),
            vec![unit("badinh", None, "Ba Dinh")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::UnmatchedCurated {
                level: AdminLevel::District,
                count: 1,
                units: vec!["Ba Dinh".into()],
            }
        );
    }

    #[test]
    fn ward_join_uses_district_and_ward_keys() {
        let d = districts();
        let wards = vec![
            ward(&d[0], "VNM.25.1.1_1", "Phường", "BếnNghé"),
            ward(&d[1], "VNM.25.20.1_1", "Phường", "BếnNghé"),
        ];
        let table = reconcile_boundaries(
            AdminLevel::Ward,
            Crs::Wgs84,
            &hcmc(),
            wards,
            vec![unit("1", Some("bennghe"), "District 1 / Ben Nghe")],
        )
        .unwrap();
        assert_eq!(table.get("VNM.25.1.1_1").unwrap().origin, GeometrySource::Curated);
        assert_eq!(
            table.get("VNM.25.20.1_1").unwrap().origin,
            GeometrySource::Gazetteer
        );
    }

    #[test]
    fn a_unit_claimed_twice_is_rejected() {
        let err = reconcile_boundaries(
            AdminLevel::District,
            Crs::Wgs84,
            &hcmc(),
            districts(),
            vec![unit("1", None, "District 1"), unit("1", None, "Quan 1")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::DuplicateCurated {
                level: AdminLevel::District,
                id: "VNM.25.1_1".into()
            }
        );
    }

    #[test]
    fn a_key_shared_by_two_units_is_ambiguous() {
        let mut d = districts();
        d.push(district("VNM.25.9_1", "HồChíMinh", "Huyện", "1"));
        let err = reconcile_boundaries(
            AdminLevel::District,
            Crs::Wgs84,
            &hcmc(),
            d,
            vec![unit("1", None, "District 1")],
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::AmbiguousCurated { ref candidates, .. } if candidates.len() == 2));
    }

    #[test]
    fn city_level_is_not_reconciled() {
        let err =
            reconcile_boundaries(AdminLevel::City, Crs::Wgs84, &hcmc(), vec![], vec![]).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::UnsupportedLevel {
                level: AdminLevel::City
            }
        );
    }
}
