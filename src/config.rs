//! Run configuration for the zonal statistics pipeline

use crate::types::{ZonalError, ZonalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do when a raster in the image list cannot be processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageErrorPolicy {
    /// Log the failure, leave the image out of the table and keep going
    #[default]
    Skip,
    /// Stop the whole run at the first failing image
    Abort,
}

/// What to do when an output directory already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingDirPolicy {
    #[default]
    Fail,
    /// Write into the existing directory, overwriting files with the same name
    Reuse,
    /// Delete the directory and everything in it, then recreate it
    Replace,
}

/// Landsat tile zone codes used by the site layers (WGS84 / UTM south)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsZone {
    Z52,
    Z53,
    Z54,
}

impl CrsZone {
    /// EPSG code of the matching WGS84 / UTM southern zone
    pub fn epsg(&self) -> u32 {
        match self {
            CrsZone::Z52 => 32752,
            CrsZone::Z53 => 32753,
            CrsZone::Z54 => 32754,
        }
    }

    /// Single digit used in image filenames (`...m2.img`, `...m3.img`)
    pub fn code(&self) -> u8 {
        match self {
            CrsZone::Z52 => 2,
            CrsZone::Z53 => 3,
            CrsZone::Z54 => 4,
        }
    }
}

impl fmt::Display for CrsZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WGSz5{}", self.code())
    }
}

impl FromStr for CrsZone {
    type Err = ZonalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2" | "52" => Ok(CrsZone::Z52),
            "3" | "53" => Ok(CrsZone::Z53),
            "4" | "54" => Ok(CrsZone::Z54),
            other => Err(ZonalError::Config(format!("Unknown CRS zone code: {}", other))),
        }
    }
}

/// Configuration for one collection run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Variable code selecting the column schema (e.g. `h99`, `dka`)
    pub variable: String,
    /// Pixel value treated as "no measurement"
    pub no_data: f64,
    /// Directory receiving the per-site CSV files
    pub output_dir: PathBuf,
    /// Tile or collection id embedded in output file names
    pub collection_id: Option<String>,
    /// Variable codes whose unit offset correction is enabled
    pub offset_enabled: BTreeSet<String>,
    pub on_image_error: ImageErrorPolicy,
    pub existing_output_dir: ExistingDirPolicy,
    /// Optional directory for the per-image tables
    pub image_table_dir: Option<PathBuf>,
    /// Log what would be written without touching the filesystem
    pub dry_run: bool,
    /// Process images on the rayon thread pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variable: String::new(),
            no_data: 0.0,
            output_dir: PathBuf::from("zonal_stats"),
            collection_id: None,
            offset_enabled: BTreeSet::new(),
            on_image_error: ImageErrorPolicy::Skip,
            existing_output_dir: ExistingDirPolicy::Fail,
            image_table_dir: None,
            dry_run: false,
            parallel: false,
        }
    }
}

impl PipelineConfig {
    pub fn new(variable: &str, no_data: f64, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            variable: variable.to_string(),
            no_data,
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file; absent keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ZonalResult<Self> {
        log::debug!("Loading configuration from {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn offset_enabled_for(&self, variable: &str) -> bool {
        self.offset_enabled.contains(variable)
    }

    pub fn validate(&self) -> ZonalResult<()> {
        if self.variable.trim().is_empty() {
            return Err(ZonalError::Config("No variable code given".to_string()));
        }
        if self.no_data.is_nan() {
            return Err(ZonalError::Config(
                "The no-data value must be a number (NaN pixels are always excluded)".to_string(),
            ));
        }
        Ok(())
    }
}
