// src/boundary/curated.rs
//! Locally curated metro boundaries (CityScope layout).
//!
//! Names are English-flavoured ("District 1", "Ward 12", "Thu Duc") and the
//! file is usually in a projected CRS, so every unit is reduced to the same
//! transliterated key the gazetteer produces and reprojected on the way in.

use anyhow::{Context, Result};
use geo::MultiPolygon;
use geojson::FeatureCollection;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::CuratedConfig;
use crate::error::ReconcileError;
use crate::geo::{declared_crs, Crs, FeatureExt, Reprojection};
use crate::names::{transliterate, AdminLevel, AdminPath, TitleVocabulary};

static DISTRICT_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdistrict\b").expect("static regex"));
static WARD_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bward\b").expect("static regex"));

/// One curated polygon, keyed for the join against the gazetteer.
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedUnit {
    /// Names as written in the file, for diagnostics.
    pub label: String,
    pub district_key: String,
    /// Present for ward-level files.
    pub ward_key: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

impl CuratedUnit {
    /// Join key; the same shape as [`gazetteer_key`].
    pub fn key(&self) -> String {
        join_key(&self.district_key, self.ward_key.as_deref())
    }
}

pub(crate) fn join_key(district: &str, ward: Option<&str>) -> String {
    match ward {
        Some(w) => format!("{}/{}", district, w),
        None => district.to_string(),
    }
}

/// Key of a gazetteer record in curated-join terms: transliterated names only.
pub fn gazetteer_key(path: &AdminPath) -> String {
    join_key(
        &path.district.name.translit,
        path.ward.as_ref().map(|w| w.name.translit.as_str()),
    )
}

pub struct CuratedReader<'a> {
    vocab: TitleVocabulary,
    config: &'a CuratedConfig,
}

impl<'a> CuratedReader<'a> {
    pub fn new(vocab: TitleVocabulary, config: &'a CuratedConfig) -> Self {
        Self { vocab, config }
    }

    /// "District 1" → "1", "Thu Duc" → "thuduc".
    pub fn district_key(&self, raw: &str) -> String {
        self.key(&DISTRICT_WORD.replace_all(raw, "Quan"))
    }

    pub fn ward_key(&self, raw: &str) -> String {
        self.key(&WARD_WORD.replace_all(raw, "Phuong"))
    }

    fn key(&self, name: &str) -> String {
        let ascii = transliterate(name);
        self.vocab.strip_translit(&ascii).to_string()
    }

    /// Read a curated file of `level` and bring its polygons into `target`.
    #[tracing::instrument(level = "debug", skip(self, fc), fields(features = fc.features.len()))]
    pub fn read(
        &self,
        level: AdminLevel,
        fc: FeatureCollection,
        target: Crs,
    ) -> Result<Vec<CuratedUnit>> {
        if level == AdminLevel::City {
            return Err(ReconcileError::UnsupportedLevel { level }.into());
        }
        let source = declared_crs(&fc).unwrap_or(self.config.crs);
        debug!(%source, %target, "reprojecting curated polygons");
        let reproject = Reprojection::new(source, target)?;

        let mut out = Vec::with_capacity(fc.features.len());
        for (index, mut feature) in fc.features.into_iter().enumerate() {
            let district_raw = feature.text(index, &self.config.district_property)?;
            let ward_raw = match level {
                AdminLevel::Ward => Some(feature.text(index, &self.config.ward_property)?),
                _ => None,
            };
            let label = match &ward_raw {
                Some(w) => format!("{} / {}", district_raw, w),
                None => district_raw.clone(),
            };
            let geometry = feature
                .take_areal(index)
                .and_then(|g| reproject.apply(&g))
                .with_context(|| format!("curated unit {}", label))?;
            out.push(CuratedUnit {
                district_key: self.district_key(&district_raw),
                ward_key: ward_raw.as_deref().map(|w| self.ward_key(w)),
                geometry,
                label,
            });
        }
        info!(%level, units = out.len(), "curated boundaries loaded");
        Ok(out)
    }
}
