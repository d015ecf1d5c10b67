// src/config.rs
//! Run configuration, read from a YAML file.
//!
//! Relative paths are resolved against the directory holding the file, so a
//! config can travel with its data folder.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::census::PivotLayout;
use crate::geo::Crs;

pub const CONFIG_ENV: &str = "VNADMIN_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "vnadmin.yaml";

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_country() -> String {
    "VNM".to_string()
}

fn default_target_city() -> String {
    "Hồ Chí Minh".to_string()
}

fn default_curated_crs() -> Crs {
    Crs::Utm {
        zone: 48,
        north: true,
    }
}

fn default_district_property() -> String {
    "Dist_Name".to_string()
}

fn default_ward_property() -> String {
    "Com_Name".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// `GID_0` of the national scope.
    #[serde(default = "default_country")]
    pub country_gid: String,
    /// City whose gazetteer polygons are replaced by the curated set.
    #[serde(default = "default_target_city")]
    pub target_city: String,
    pub gazetteer: GazetteerPaths,
    pub curated: CuratedConfig,
    pub census: CensusSheets,
    /// Alternate exception tables; the built-in ones are used when absent.
    #[serde(default)]
    pub corrections: Option<PathBuf>,
    #[serde(default)]
    pub write_parquet: bool,
    #[serde(default)]
    pub fail_on_unresolved: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GazetteerPaths {
    pub district: PathBuf,
    pub ward: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CuratedConfig {
    pub district: PathBuf,
    pub ward: PathBuf,
    /// CRS of the curated files when they do not declare one.
    #[serde(default = "default_curated_crs")]
    pub crs: Crs,
    #[serde(default = "default_district_property")]
    pub district_property: String,
    #[serde(default = "default_ward_property")]
    pub ward_property: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CensusSheets {
    pub ward_population: SheetConfig,
    pub district_youth: SheetConfig,
    pub ward_household: SheetConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetConfig {
    pub path: PathBuf,
    /// Overrides the sheet's standard layout.
    #[serde(default)]
    pub layout: Option<PivotLayout>,
}

impl PipelineConfig {
    /// Path named by `VNADMIN_CONFIG`, or `vnadmin.yaml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = Self::from_yaml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(cfg.resolved_against(base))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Rebase every relative path onto `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        fix(&mut self.output_dir);
        fix(&mut self.gazetteer.district);
        fix(&mut self.gazetteer.ward);
        fix(&mut self.curated.district);
        fix(&mut self.curated.ward);
        fix(&mut self.census.ward_population.path);
        fix(&mut self.census.district_youth.path);
        fix(&mut self.census.ward_household.path);
        if let Some(p) = self.corrections.as_mut() {
            fix(p);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"
gazetteer:
  district: gadm/VNM_2.json
  ward: gadm/VNM_3.json
curated:
  district: hcmc/district.json
  ward: hcmc/ward.json
census:
  ward_population: { path: census/pop.csv }
  district_youth: { path: census/youth.csv }
  ward_household: { path: census/household.csv }
"#;

    #[test]
    fn defaults_fill_the_gaps() {
        let cfg = PipelineConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(cfg.country_gid, "VNM");
        assert_eq!(cfg.target_city, "Hồ Chí Minh");
        assert_eq!(cfg.curated.crs, Crs::Utm { zone: 48, north: true });
        assert_eq!(cfg.curated.district_property, "Dist_Name");
        assert_eq!(cfg.curated.ward_property, "Com_Name");
        assert!(cfg.corrections.is_none());
        assert!(!cfg.write_parquet);
        assert!(!cfg.fail_on_unresolved);
        assert!(cfg.census.district_youth.layout.is_none());
    }

    #[test]
    fn crs_and_layout_overrides() {
        let yaml = MINIMAL.replace(
            "  ward: hcmc/ward.json\n",
            "  ward: hcmc/ward.json\n  crs: \"EPSG:4326\"\n",
        ) + "write_parquet: true\n";
        let cfg = PipelineConfig::from_yaml(&yaml).unwrap();
        assert_eq!(cfg.curated.crs, Crs::Wgs84);
        assert!(cfg.write_parquet);

        let bad = MINIMAL.to_string() + "surprise: 1\n";
        assert!(PipelineConfig::from_yaml(&bad).is_err());
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vnadmin.yaml");
        fs::write(&path, MINIMAL.to_string() + "corrections: /etc/fixes.yaml\n").unwrap();

        let cfg = PipelineConfig::load(&path).unwrap();
        assert_eq!(cfg.output_dir, dir.path().join("output"));
        assert_eq!(cfg.gazetteer.ward, dir.path().join("gadm/VNM_3.json"));
        assert_eq!(
            cfg.census.ward_household.path,
            dir.path().join("census/household.csv")
        );
        assert_eq!(cfg.corrections, Some(PathBuf::from("/etc/fixes.yaml")));
    }
}
