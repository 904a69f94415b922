//! plotstats: zonal statistics of raster time series over monitoring plots
//!
//! This library overlays site polygons on collections of remote sensing
//! mosaics, computes per-polygon statistics for every image and assembles
//! them into per-site time series tables written as CSV.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{GeoTransform, ZonalError, ZonalResult};
pub use config::{CrsZone, ExistingDirPolicy, ImageErrorPolicy, PipelineConfig};
pub use io::{ImageCatalog, PolygonLayer, RasterImage, SitePolygon};
pub use crate::core::{RunReport, VariableSchema, ZonalPipeline};
