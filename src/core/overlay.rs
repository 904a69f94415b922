use crate::core::stats::{describe, ZonalStats};
use crate::io::vector::{PolygonLayer, SitePolygon};
use crate::types::{GeoTransform, ZonalResult};
use geo::{BoundingRect, MultiPolygon, Relate};
use ndarray::Array2;

/// Statistics of one site polygon over one raster band.
///
/// The polygon identity travels with the result so records never depend on
/// the iteration order of the layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalRecord {
    pub uid: i64,
    pub site_name: String,
    pub band: usize,
    pub stats: ZonalStats,
}

/// Overlays site polygons on a georeferenced pixel grid
#[derive(Debug, Clone)]
pub struct OverlayEngine<'a> {
    transform: GeoTransform,
    no_data: f64,
    categories: Option<&'a [(i64, &'a str)]>,
}

impl<'a> OverlayEngine<'a> {
    pub fn new(transform: GeoTransform, no_data: f64) -> Self {
        Self {
            transform,
            no_data,
            categories: None,
        }
    }

    /// Enable the categorical breakdown with a class value to label mapping
    pub fn with_categories(mut self, classes: Option<&'a [(i64, &'a str)]>) -> Self {
        self.categories = classes;
        self
    }

    fn is_valid(&self, value: f64) -> bool {
        !value.is_nan() && value != self.no_data
    }

    /// Pixels whose footprint shares area with the geometry ("all touched").
    ///
    /// Pixels that only meet the polygon along an edge or at a corner are not
    /// selected. Returned as `(row, col)` pairs in row-major order.
    pub fn touched_pixels(
        &self,
        geometry: &MultiPolygon<f64>,
        shape: (usize, usize),
    ) -> ZonalResult<Vec<(usize, usize)>> {
        let (rows, cols) = shape;
        let Some(bbox) = geometry.bounding_rect() else {
            return Ok(Vec::new());
        };

        // Candidate window from the bounding box corners in pixel space
        let (min, max) = (bbox.min(), bbox.max());
        let mut col_range = (f64::INFINITY, f64::NEG_INFINITY);
        let mut row_range = (f64::INFINITY, f64::NEG_INFINITY);
        for (x, y) in [(min.x, min.y), (min.x, max.y), (max.x, min.y), (max.x, max.y)] {
            let (col, row) = self.transform.world_to_pixel(x, y)?;
            col_range = (col_range.0.min(col), col_range.1.max(col));
            row_range = (row_range.0.min(row), row_range.1.max(row));
        }

        let col_start = col_range.0.floor().max(0.0) as usize;
        let col_end = (col_range.1.ceil().max(0.0) as usize).min(cols);
        let row_start = row_range.0.floor().max(0.0) as usize;
        let row_end = (row_range.1.ceil().max(0.0) as usize).min(rows);

        let mut pixels = Vec::new();
        for row in row_start..row_end {
            for col in col_start..col_end {
                let footprint = self.transform.pixel_footprint(row, col);
                let matrix = geometry.relate(&footprint);
                if matrix.is_intersects() && !matrix.is_touches() {
                    pixels.push((row, col));
                }
            }
        }
        Ok(pixels)
    }

    /// Statistics of the valid pixels under one geometry
    pub fn zone_stats(
        &self,
        band_data: &Array2<f64>,
        geometry: &MultiPolygon<f64>,
    ) -> ZonalResult<ZonalStats> {
        let mut values: Vec<f64> = self
            .touched_pixels(geometry, band_data.dim())?
            .into_iter()
            .map(|(row, col)| band_data[[row, col]])
            .filter(|&value| self.is_valid(value))
            .collect();

        Ok(describe(&mut values, self.categories))
    }

    /// One record per polygon of the layer for the given band
    pub fn zonal_stats(
        &self,
        band: usize,
        band_data: &Array2<f64>,
        layer: &PolygonLayer,
    ) -> ZonalResult<Vec<ZonalRecord>> {
        layer
            .iter()
            .map(|site| self.site_record(band, band_data, site))
            .collect()
    }

    fn site_record(
        &self,
        band: usize,
        band_data: &Array2<f64>,
        site: &SitePolygon,
    ) -> ZonalResult<ZonalRecord> {
        let stats = self.zone_stats(band_data, &site.geometry)?;
        if stats.is_empty() {
            log::debug!(
                "Site {} (uid {}) has no valid pixels in band {}",
                site.site_name,
                site.uid,
                band
            );
        }
        Ok(ZonalRecord {
            uid: site.uid,
            site_name: site.site_name.clone(),
            band,
            stats,
        })
    }
}
