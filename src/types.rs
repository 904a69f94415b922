use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Affine georeferencing transform (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Build from the six coefficients returned by `Dataset::geo_transform`
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Projected coordinate of a (fractional) pixel position.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> Coord<f64> {
        Coord {
            x: self.top_left_x + col * self.pixel_width + row * self.rotation_x,
            y: self.top_left_y + col * self.rotation_y + row * self.pixel_height,
        }
    }

    /// Inverse of [`pixel_to_world`](Self::pixel_to_world), returning `(col, row)`.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> ZonalResult<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 || !det.is_finite() {
            return Err(ZonalError::InvalidData(format!(
                "Geotransform is not invertible: {:?}",
                self
            )));
        }

        let dx = x - self.top_left_x;
        let dy = y - self.top_left_y;
        let col = (self.pixel_height * dx - self.rotation_x * dy) / det;
        let row = (self.pixel_width * dy - self.rotation_y * dx) / det;
        Ok((col, row))
    }

    /// Footprint of the pixel at `(row, col)` as a closed polygon.
    pub fn pixel_footprint(&self, row: usize, col: usize) -> Polygon<f64> {
        let (c, r) = (col as f64, row as f64);
        let ring = LineString::from(vec![
            self.pixel_to_world(c, r),
            self.pixel_to_world(c + 1.0, r),
            self.pixel_to_world(c + 1.0, r + 1.0),
            self.pixel_to_world(c, r + 1.0),
            self.pixel_to_world(c, r),
        ]);
        Polygon::new(ring, vec![])
    }
}

/// Error types for zonal statistics processing
#[derive(Debug, thiserror::Error)]
pub enum ZonalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Table error: {0}")]
    Table(#[from] polars::prelude::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to process image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: Box<ZonalError>,
    },

    #[error("Output directory does not exist: {0}")]
    MissingOutputDir(PathBuf),

    #[error("Unit offset has already been applied to the {0} table")]
    OffsetAlreadyApplied(String),
}

impl ZonalError {
    /// Wrap an error as a failure of a single image
    pub fn image(path: impl Into<PathBuf>, source: ZonalError) -> Self {
        ZonalError::Image {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Result type for zonal statistics operations
pub type ZonalResult<T> = Result<T, ZonalError>;
