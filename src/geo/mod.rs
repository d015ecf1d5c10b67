// src/geo/mod.rs
//! Boundary geometry: `geo` multipolygons, `proj4rs` reprojection, GeoJSON I/O.

pub mod collection;
pub mod crs;

pub use collection::{
    areal_feature, declare_crs, declared_crs, read_collection, write_collection, FeatureExt,
};
pub use crs::{Crs, Reprojection};
