//! Variable code lookup table
//!
//! Each raster product is identified by a short code that appears in its
//! filenames. The code selects the bands to read, the column layout of the
//! exported time series, whether the raster is categorical, and the unit
//! corrections the assembler may apply.

use crate::types::{ZonalError, ZonalResult};

/// Statistics the overlay engine can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Count,
    Min,
    Max,
    Mean,
    Sum,
    Std,
    Median,
    P25,
    P50,
    P75,
    P95,
    P99,
    Range,
    Majority,
    Minority,
}

impl Stat {
    /// Column name used by the long layout
    pub fn name(&self) -> &'static str {
        match self {
            Stat::Count => "count",
            Stat::Min => "min",
            Stat::Max => "max",
            Stat::Mean => "mean",
            Stat::Sum => "sum",
            Stat::Std => "std",
            Stat::Median => "median",
            Stat::P25 => "p25",
            Stat::P50 => "p50",
            Stat::P75 => "p75",
            Stat::P95 => "p95",
            Stat::P99 => "p99",
            Stat::Range => "range",
            Stat::Majority => "majority",
            Stat::Minority => "minority",
        }
    }

    /// Column suffix used by the wide layout (`b1_h99_med`)
    pub fn suffix(&self) -> &'static str {
        match self {
            Stat::Median => "med",
            other => other.name(),
        }
    }

    /// Whether the statistic is a pixel value or class (as opposed to a count or spread)
    pub fn is_location(&self) -> bool {
        matches!(
            self,
            Stat::Min
                | Stat::Max
                | Stat::Mean
                | Stat::Median
                | Stat::P25
                | Stat::P50
                | Stat::P75
                | Stat::P95
                | Stat::P99
                | Stat::Majority
                | Stat::Minority
        )
    }
}

/// How bands and statistics are laid out in the exported table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One row per site and image, statistics as `b{band}_{code}_{stat}`
    Wide,
    /// One row per site, image and band, plain statistic names and a `band` column
    Long,
}

/// Month-of-year class labels of seasonal categorical composites
pub const MONTH_CLASSES: &[(i64, &str)] = &[
    (1, "jan"),
    (2, "feb"),
    (3, "mar"),
    (4, "april"),
    (5, "may"),
    (6, "june"),
    (7, "july"),
    (8, "aug"),
    (9, "sep"),
    (10, "oct"),
    (11, "nov"),
    (12, "dec"),
];

const CONTINUOUS_STATS: &[Stat] = &[
    Stat::Min,
    Stat::Max,
    Stat::Mean,
    Stat::Count,
    Stat::Std,
    Stat::Median,
    Stat::P25,
    Stat::P50,
    Stat::P75,
    Stat::P95,
    Stat::P99,
    Stat::Range,
];

const CATEGORICAL_STATS: &[Stat] = &[
    Stat::Count,
    Stat::Min,
    Stat::Max,
    Stat::Mean,
    Stat::Sum,
    Stat::Std,
    Stat::Median,
    Stat::Majority,
    Stat::Minority,
];

/// Identifier and date columns shared by every schema
pub const ID_COLUMNS: &[&str] = &["uid", "site", "image", "date"];

/// Derived date columns inserted by the assembler
pub const DATE_COLUMNS: &[&str] = &[
    "start_day",
    "start_month",
    "start_year",
    "start_date",
    "end_day",
    "end_month",
    "end_year",
    "end_date",
];

/// Declared schema of one raster variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSchema {
    pub code: &'static str,
    pub description: &'static str,
    pub bands: &'static [usize],
    pub layout: Layout,
    pub stats: &'static [Stat],
    /// Class value to label mapping for categorical rasters
    pub categories: Option<&'static [(i64, &'static str)]>,
    /// Storage offset of the pixel values, removed only when enabled for the run
    pub unit_offset: Option<f64>,
    /// Treat a minimum of exactly zero as missing
    pub zero_min_is_missing: bool,
}

const fn tile_product(code: &'static str, description: &'static str) -> VariableSchema {
    VariableSchema {
        code,
        description,
        bands: &[1],
        layout: Layout::Wide,
        stats: CONTINUOUS_STATS,
        categories: None,
        unit_offset: None,
        zero_min_is_missing: true,
    }
}

/// All known variables
pub const VARIABLES: &[VariableSchema] = &[
    VariableSchema {
        code: "dil",
        description: "Seasonal fractional cover (bare, green, non-green)",
        bands: &[1, 2, 3],
        layout: Layout::Wide,
        stats: CONTINUOUS_STATS,
        categories: None,
        unit_offset: Some(100.0),
        zero_min_is_missing: false,
    },
    tile_product("h99", "Canopy height 99th percentile"),
    tile_product("hcv", "Canopy height coefficient of variation"),
    tile_product("hmc", "Canopy height mean"),
    tile_product("hsd", "Canopy height standard deviation"),
    tile_product("h25", "Clipped canopy cover above 2.5 m"),
    tile_product("fdc", "Foliage density cover"),
    tile_product("wdc", "Woody density cover"),
    VariableSchema {
        unit_offset: Some(100.0),
        ..tile_product("ccw", "Canopy cover woody")
    },
    tile_product("n17", "NDVI derived woody index"),
    tile_product("wfp", "Woody foliage projective cover"),
    VariableSchema {
        code: "dka",
        description: "Seasonal fire scar month (categorical)",
        bands: &[1],
        layout: Layout::Long,
        stats: CATEGORICAL_STATS,
        categories: Some(MONTH_CLASSES),
        unit_offset: Some(100.0),
        zero_min_is_missing: false,
    },
];

/// Look up the schema of a variable code
pub fn lookup(code: &str) -> ZonalResult<&'static VariableSchema> {
    let code = code.trim().to_ascii_lowercase();
    VARIABLES
        .iter()
        .find(|schema| schema.code == code)
        .ok_or_else(|| {
            ZonalError::Config(format!(
                "Unknown variable code '{}', expected one of: {}",
                code,
                VARIABLES.iter().map(|s| s.code).collect::<Vec<_>>().join(", ")
            ))
        })
}

impl VariableSchema {
    pub fn is_categorical(&self) -> bool {
        self.categories.is_some()
    }

    /// Name of the column holding `stat` for `band`
    pub fn stat_column(&self, band: usize, stat: Stat) -> String {
        match self.layout {
            Layout::Wide => format!("b{}_{}_{}", band, self.code, stat.suffix()),
            Layout::Long => stat.name().to_string(),
        }
    }

    /// Statistic columns in canonical order (category labels included)
    pub fn stat_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        match self.layout {
            Layout::Wide => {
                for &band in self.bands {
                    for &stat in self.stats {
                        columns.push(self.stat_column(band, stat));
                    }
                }
            }
            Layout::Long => {
                for &stat in self.stats {
                    columns.push(stat.name().to_string());
                }
            }
        }
        columns.extend(self.category_columns());
        columns
    }

    /// Class fraction columns, one per mapped label.
    ///
    /// A zone with valid pixels reports 0.0 for a class it does not contain;
    /// only an empty zone leaves the fractions missing.
    pub fn category_columns(&self) -> Vec<String> {
        self.categories
            .map(|classes| classes.iter().map(|(_, label)| label.to_string()).collect())
            .unwrap_or_default()
    }

    /// Columns of a per-image table, before date decomposition
    pub fn image_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = ID_COLUMNS.iter().map(|c| c.to_string()).collect();
        if self.layout == Layout::Long {
            columns.push("band".to_string());
        }
        columns.extend(self.stat_columns());
        columns
    }

    /// Export column order of the assembled time series
    pub fn canonical_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = ID_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.extend(DATE_COLUMNS.iter().map(|c| c.to_string()));
        if self.layout == Layout::Long {
            columns.push("band".to_string());
        }
        columns.extend(self.stat_columns());
        columns
    }

    /// Columns shifted by the unit offset correction
    pub fn offset_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        match self.layout {
            Layout::Wide => {
                for &band in self.bands {
                    for stat in self.stats.iter().filter(|s| s.is_location()) {
                        columns.push(self.stat_column(band, *stat));
                    }
                }
            }
            Layout::Long => {
                for stat in self.stats.iter().filter(|s| s.is_location()) {
                    columns.push(stat.name().to_string());
                }
            }
        }
        columns
    }

    /// Minimum columns masked when `zero_min_is_missing` is set
    pub fn min_columns(&self) -> Vec<String> {
        match self.layout {
            Layout::Wide => self
                .bands
                .iter()
                .map(|&band| self.stat_column(band, Stat::Min))
                .collect(),
            Layout::Long => vec![Stat::Min.name().to_string()],
        }
    }
}
