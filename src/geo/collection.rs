// src/geo/collection.rs
//! GeoJSON files through the `geojson` crate.
//!
//! Boundaries are areal: every geometry read is turned into a
//! `MultiPolygon`, a bare `Polygon` becoming a one-part multipolygon.

use anyhow::{Context, Result};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use std::{
    fs,
    io::{BufReader, BufWriter, Write},
    path::Path,
};
use tracing::debug;

use crate::error::ReconcileError;
use crate::export::write_atomically;

use super::Crs;

/// Legacy GeoJSON 2008 member, still written by many GIS exports.
const CRS_MEMBER: &str = "crs";

/// Typed access to the parts of a feature the pipeline reads.
pub trait FeatureExt {
    /// Property `key` as text. Numbers are rendered, blanks count as missing.
    fn text(&self, index: usize, key: &str) -> Result<String, ReconcileError>;

    /// Move the geometry out as a multipolygon.
    fn take_areal(&mut self, index: usize) -> Result<MultiPolygon<f64>, ReconcileError>;
}

impl FeatureExt for Feature {
    fn text(&self, index: usize, key: &str) -> Result<String, ReconcileError> {
        match self.property(key) {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(JsonValue::Number(n)) => Ok(n.to_string()),
            _ => Err(ReconcileError::MissingProperty {
                index,
                property: key.to_string(),
            }),
        }
    }

    fn take_areal(&mut self, index: usize) -> Result<MultiPolygon<f64>, ReconcileError> {
        let geometry = self
            .geometry
            .take()
            .ok_or_else(|| ReconcileError::MissingProperty {
                index,
                property: "geometry".to_string(),
            })?;
        let bad = |reason: String| ReconcileError::BadGeometry { index, reason };
        match geo::Geometry::<f64>::try_from(geometry).map_err(|e| bad(e.to_string()))? {
            geo::Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
            geo::Geometry::MultiPolygon(mp) => Ok(mp),
            other => Err(bad(format!(
                "expected Polygon or MultiPolygon, found {}",
                geometry_kind(&other)
            ))),
        }
    }
}

fn geometry_kind(g: &geo::Geometry<f64>) -> &'static str {
    match g {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

pub fn areal_feature(properties: JsonObject, geometry: &MultiPolygon<f64>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// CRS named by the collection's `crs` member, if present and understood.
pub fn declared_crs(fc: &FeatureCollection) -> Option<Crs> {
    fc.foreign_members
        .as_ref()?
        .get(CRS_MEMBER)?
        .pointer("/properties/name")?
        .as_str()?
        .parse()
        .ok()
}

/// Record `crs` in the collection's `crs` member as an OGC URN.
pub fn declare_crs(fc: &mut FeatureCollection, crs: Crs) {
    let member = serde_json::json!({
        "type": "name",
        "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", crs.epsg()) }
    });
    fc.foreign_members
        .get_or_insert_with(JsonObject::new)
        .insert(CRS_MEMBER.to_string(), member);
}

pub fn read_collection<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let fc: FeatureCollection = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing GeoJSON {}", path.display()))?;
    debug!(path = %path.display(), features = fc.features.len(), "read feature collection");
    Ok(fc)
}

/// Write atomically: to a dot-prefixed tmp file, then rename over `path`.
pub fn write_collection<P: AsRef<Path>>(path: P, fc: &FeatureCollection) -> Result<()> {
    write_atomically(path.as_ref(), |file| {
        let mut w = BufWriter::new(file);
        serde_json::to_writer(&mut w, fc).context("serializing GeoJSON")?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use serde_json::json;
    use tempfile::tempdir;

    fn collection(raw: JsonValue) -> FeatureCollection {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn reads_properties_and_declared_crs() {
        let fc = collection(json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::32648" } },
            "features": [{
                "type": "Feature",
                "properties": { "Dist_Name": "District 1", "OBJECTID": 7, "blank": " " },
                "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]] }
            }]
        }));
        assert_eq!(declared_crs(&fc), Some(Crs::Utm { zone: 48, north: true }));

        let f = &fc.features[0];
        assert_eq!(f.text(0, "Dist_Name").unwrap(), "District 1");
        assert_eq!(f.text(0, "OBJECTID").unwrap(), "7");
        assert_eq!(
            f.text(0, "blank").unwrap_err(),
            ReconcileError::MissingProperty {
                index: 0,
                property: "blank".into()
            }
        );
        assert!(f.text(0, "Com_Name").is_err());
    }

    #[test]
    fn polygons_become_multipolygons_and_lines_are_rejected() {
        let mut fc = collection(json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [2.0, 0.0], [0.0, 2.0], [0.0, 0.0]]] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] } },
                { "type": "Feature", "properties": {}, "geometry": null }
            ]
        }));
        let mp = fc.features[0].take_areal(0).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].exterior().0.len(), 4);

        assert!(matches!(
            fc.features[1].take_areal(1),
            Err(ReconcileError::BadGeometry { index: 1, .. })
        ));
        assert_eq!(
            fc.features[2].take_areal(2).unwrap_err(),
            ReconcileError::MissingProperty {
                index: 2,
                property: "geometry".into()
            }
        );
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut props = JsonObject::new();
        props.insert("ward_id".into(), json!("VNM.1.1.1_1"));
        let shape = MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0)]]);
        let mut fc: FeatureCollection = vec![areal_feature(props, &shape)].into_iter().collect();
        declare_crs(&mut fc, Crs::Wgs84);
        write_collection(&path, &fc).unwrap();

        let mut back = read_collection(&path).unwrap();
        assert_eq!(declared_crs(&back), Some(Crs::Wgs84));
        assert_eq!(back.features[0].text(0, "ward_id").unwrap(), "VNM.1.1.1_1");
        assert_eq!(back.features[0].take_areal(0).unwrap(), shape);
        assert!(!dir.path().join(".out.json.tmp").exists());
    }
}
