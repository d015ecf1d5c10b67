// src/boundary/gazetteer.rs
//! National gazetteer (GADM layout) reader.
//!
//! Names in the gazetteer carry no spaces and sometimes a title, either as a
//! parenthetical suffix ("CaoLãnh(Thànhphố)") or as a leading word
//! ("ThànhPhốBắcKạn"). Both are removed; the title column is canonicalized.

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{BoundaryRecord, GeometrySource};
use crate::correct::Corrector;
use crate::geo::{declared_crs, Crs, FeatureExt};
use crate::names::{AdminLevel, AdminName, AdminPath, NameKey, NameNormalizer};

const COUNTRY: &str = "GID_0";
const CITY_NAME: &str = "NAME_1";
const DISTRICT_ID: &str = "GID_2";
const DISTRICT_NAME: &str = "NAME_2";
const DISTRICT_TYPE: &str = "TYPE_2";
const WARD_ID: &str = "GID_3";
const WARD_NAME: &str = "NAME_3";
const WARD_TYPE: &str = "TYPE_3";

/// Turns gazetteer features into normalized, corrected boundary records.
pub struct Gazetteer<'a> {
    normalizer: NameNormalizer,
    corrector: &'a Corrector,
    country: &'a str,
}

impl<'a> Gazetteer<'a> {
    pub fn new(normalizer: NameNormalizer, corrector: &'a Corrector, country: &'a str) -> Self {
        Self {
            normalizer,
            corrector,
            country,
        }
    }

    /// CRS a gazetteer file is in: its own declaration, else WGS 84.
    pub fn crs_of(fc: &FeatureCollection) -> Crs {
        declared_crs(fc).unwrap_or(Crs::Wgs84)
    }

    fn in_scope(&self, index: usize, feature: &Feature) -> Result<bool> {
        Ok(feature.text(index, COUNTRY)? == self.country)
    }

    fn unit_name(&self, level: AdminLevel, id: &str, raw_name: &str, raw_type: &str) -> AdminName {
        let body = self.normalizer.body(raw_name);
        let fixed = match self.corrector.for_id(id) {
            Some(name) => {
                debug!(id, from = %body, to = name, "id-anchored rename");
                name.to_string()
            }
            None => self.corrector.correct(level, &body).to_string(),
        };
        AdminName {
            name: NameKey::new(fixed),
            title: NameKey::new(self.normalizer.canonical_title(raw_type)),
        }
    }

    fn city_name(&self, raw_name: &str) -> AdminName {
        let body = self.normalizer.body(raw_name);
        AdminName {
            name: NameKey::new(self.corrector.correct(AdminLevel::City, &body)),
            title: NameKey::default(),
        }
    }

    /// District-level units of the configured country.
    #[tracing::instrument(level = "debug", skip_all, fields(country = self.country))]
    pub fn districts(&self, fc: FeatureCollection) -> Result<Vec<BoundaryRecord>> {
        let total = fc.features.len();
        let mut out = Vec::with_capacity(total);
        for (index, mut feature) in fc.features.into_iter().enumerate() {
            if !self.in_scope(index, &feature)? {
                continue;
            }
            let id = feature.text(index, DISTRICT_ID)?;
            let city = self.city_name(&feature.text(index, CITY_NAME)?);
            let district = self.unit_name(
                AdminLevel::District,
                &id,
                &feature.text(index, DISTRICT_NAME)?,
                &feature.text(index, DISTRICT_TYPE)?,
            );
            let geometry = feature
                .take_areal(index)
                .with_context(|| format!("district {}", id))?;
            out.push(BoundaryRecord {
                district_id: id.clone(),
                id,
                path: AdminPath {
                    city,
                    district,
                    ward: None,
                },
                geometry,
                area_sqm: None,
                origin: GeometrySource::Gazetteer,
            });
        }
        info!(total, kept = out.len(), "gazetteer districts loaded");
        Ok(out)
    }

    /// Ward-level units; city and district identity come from `districts`
    /// through the parent identifier.
    #[tracing::instrument(level = "debug", skip_all, fields(country = self.country))]
    pub fn wards(
        &self,
        fc: FeatureCollection,
        districts: &[BoundaryRecord],
    ) -> Result<Vec<BoundaryRecord>> {
        let parents: HashMap<&str, &BoundaryRecord> =
            districts.iter().map(|d| (d.id.as_str(), d)).collect();

        let total = fc.features.len();
        let mut orphans = 0usize;
        let mut out = Vec::with_capacity(total);
        for (index, mut feature) in fc.features.into_iter().enumerate() {
            if !self.in_scope(index, &feature)? {
                continue;
            }
            let id = feature.text(index, WARD_ID)?;
            let parent_id = feature.text(index, DISTRICT_ID)?;
            let Some(parent) = parents.get(parent_id.as_str()) else {
                warn!(%id, parent = %parent_id, "ward has no district in the gazetteer; skipped");
                orphans += 1;
                continue;
            };
            let ward = self.unit_name(
                AdminLevel::Ward,
                &id,
                &feature.text(index, WARD_NAME)?,
                &feature.text(index, WARD_TYPE)?,
            );
            let geometry = feature
                .take_areal(index)
                .with_context(|| format!("ward {}", id))?;
            out.push(BoundaryRecord {
                id,
                district_id: parent.id.clone(),
                path: AdminPath {
                    ward: Some(ward),
                    ..parent.path.clone()
                },
                geometry,
                area_sqm: None,
                origin: GeometrySource::Gazetteer,
            });
        }
        info!(total, kept = out.len(), orphans, "gazetteer wards loaded");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::fixtures::square;
    use crate::correct::Corrections;
    use crate::error::ReconcileError;
    use crate::geo::areal_feature;
    use geojson::{JsonObject, JsonValue};
    use serde_json::json;

    fn feature(props: JsonValue) -> Feature {
        let properties: JsonObject = serde_json::from_value(props).unwrap();
        areal_feature(properties, &square(106.7, 10.7, 0.01))
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        features.into_iter().collect()
    }

    fn district_fc() -> FeatureCollection {
        collection(vec![
            feature(json!({"GID_0": "VNM", "NAME_1": "HồChíMinh", "GID_2": "VNM.25.1_1",
                           "NAME_2": "1", "TYPE_2": "Quận"})),
            feature(json!({"GID_0": "VNM", "NAME_1": "BìnhĐịnh", "GID_2": "VNM.8.9_1",
                           "NAME_2": "QuiNhơn", "TYPE_2": "Thành phố"})),
            feature(json!({"GID_0": "VNM", "NAME_1": "ĐồngTháp", "GID_2": "VNM.17.1_1",
                           "NAME_2": "CaoLãnh(Thànhphố)", "TYPE_2": "Thành phố"})),
            feature(json!({"GID_0": "LAO", "NAME_1": "Attapu", "GID_2": "LAO.1.1_1",
                           "NAME_2": "Phouvong", "TYPE_2": "District"})),
        ])
    }

    #[test]
    fn districts_are_scoped_normalized_and_corrected() {
        let corrections = Corrections::builtin().unwrap();
        let gaz = Gazetteer::new(NameNormalizer::default(), &corrections.gazetteer, "VNM");
        let districts = gaz.districts(district_fc()).unwrap();

        assert_eq!(districts.len(), 3);
        let q1 = &districts[0];
        assert_eq!(q1.path.district.name.native, "1");
        assert_eq!(q1.path.district.title.native, "Quận");
        assert_eq!(q1.path.city.name.translit, "hochiminh");

        assert_eq!(districts[1].path.district.name.native, "QuyNhơn");
        assert_eq!(districts[1].path.district.title.native, "ThànhPhố");

        assert_eq!(districts[2].path.district.name.native, "CaoLãnh");
        assert_eq!(districts[2].district_id, "VNM.17.1_1");
    }

    #[test]
    fn wards_inherit_parent_identity() {
        let corrections = Corrections::builtin().unwrap();
        let gaz = Gazetteer::new(NameNormalizer::default(), &corrections.gazetteer, "VNM");
        let districts = gaz.districts(district_fc()).unwrap();

        let wards = collection(vec![
            feature(json!({"GID_0": "VNM", "GID_2": "VNM.25.1_1", "GID_3": "VNM.25.1.1_1",
                           "NAME_3": "BếnNghé", "TYPE_3": "Phường"})),
            feature(json!({"GID_0": "VNM", "GID_2": "VNM.39.1_1", "GID_3": "VNM.39.1.15_1",
                           "NAME_3": "ThanhPhúc", "TYPE_3": "Xã"})),
            feature(json!({"GID_0": "VNM", "GID_2": "VNM.8.9_1", "GID_3": "VNM.8.9.3_1",
                           "NAME_3": "Cầukho", "TYPE_3": "Thị trấn"})),
        ]);
        let wards = gaz.wards(wards, &districts).unwrap();

        // the VNM.39.1_1 ward has no parent in this fixture
        assert_eq!(wards.len(), 2);
        let ben_nghe = &wards[0];
        assert_eq!(ben_nghe.district_id, "VNM.25.1_1");
        assert_eq!(ben_nghe.path.district.name.native, "1");
        assert_eq!(ben_nghe.level(), AdminLevel::Ward);

        let cau_kho = &wards[1];
        assert_eq!(cau_kho.path.unit().name.native, "CầuKho");
        assert_eq!(cau_kho.path.unit().title.native, "ThịTrấn");
    }

    #[test]
    fn id_anchored_rename_wins() {
        let corrections = Corrections::builtin().unwrap();
        let gaz = Gazetteer::new(NameNormalizer::default(), &corrections.gazetteer, "VNM");
        let name = gaz.unit_name(AdminLevel::Ward, "VNM.39.1.15_1", "ThanhPhúc", "Xã");
        assert_eq!(name.name.native, "ThanhPhú");
    }

    #[test]
    fn missing_country_code_is_reported() {
        let corrections = Corrections::builtin().unwrap();
        let gaz = Gazetteer::new(NameNormalizer::default(), &corrections.gazetteer, "VNM");
        let fc = collection(vec![feature(json!({"NAME_1": "HàNội"}))]);
        let err = gaz.districts(fc).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReconcileError>(),
            Some(&ReconcileError::MissingProperty {
                index: 0,
                property: "GID_0".into()
            })
        );
    }
}
