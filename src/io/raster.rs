use crate::types::{GeoTransform, ZonalError, ZonalResult};
use gdal::Dataset;
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// An open raster mosaic with a caller-supplied no-data sentinel.
///
/// The GDAL handle is released when the image is dropped, including on
/// early returns through `?`.
pub struct RasterImage {
    path: PathBuf,
    dataset: Dataset,
    transform: GeoTransform,
    no_data: f64,
}

impl RasterImage {
    /// Open a raster; `no_data` overrides any value declared in the file
    pub fn open<P: AsRef<Path>>(path: P, no_data: f64) -> ZonalResult<Self> {
        let path = path.as_ref();
        log::debug!("Opening raster: {}", path.display());

        let dataset = Dataset::open(path)?;
        let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
        let (width, height) = dataset.raster_size();
        log::debug!("Raster size: {}x{}, geotransform: {:?}", width, height, transform);

        Ok(Self {
            path: path.to_path_buf(),
            dataset,
            transform,
            no_data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used for the image column of the output tables
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn no_data(&self) -> f64 {
        self.no_data
    }

    /// Projection WKT (empty when the file carries none)
    pub fn projection(&self) -> String {
        self.dataset.projection()
    }

    pub fn band_count(&self) -> usize {
        self.dataset.raster_count().max(0) as usize
    }

    /// Shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        let (width, height) = self.dataset.raster_size();
        (height, width)
    }

    /// Read a whole band (1-based index) as `f64`
    pub fn read_band(&self, band: usize) -> ZonalResult<Array2<f64>> {
        if band == 0 || band > self.band_count() {
            return Err(ZonalError::InvalidData(format!(
                "{} has {} band(s), band {} requested",
                self.path.display(),
                self.band_count(),
                band
            )));
        }

        let rasterband = self.dataset.rasterband(band as isize)?;
        if let Some(declared) = rasterband.no_data_value() {
            if declared != self.no_data {
                log::debug!(
                    "Band {} declares no-data {}, using {} instead",
                    band,
                    declared,
                    self.no_data
                );
            }
        }

        let (width, height) = self.dataset.raster_size();
        let band_data = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;

        Array2::from_shape_vec((height, width), band_data.data).map_err(|e| {
            ZonalError::InvalidData(format!("Failed to reshape band {}: {}", band, e))
        })
    }
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("path", &self.path)
            .field("transform", &self.transform)
            .field("no_data", &self.no_data)
            .finish()
    }
}
