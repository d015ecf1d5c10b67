pub mod boundary;
pub mod census;
pub mod config;
pub mod correct;
pub mod error;
pub mod export;
pub mod geo;
pub mod metrics;
pub mod names;
pub mod pipeline;
pub mod population;
