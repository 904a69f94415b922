use crate::core::date_parser::DateToken;
use crate::core::overlay::{OverlayEngine, ZonalRecord};
use crate::core::table::float_column;
use crate::core::variables::{Layout, VariableSchema};
use crate::io::raster::RasterImage;
use crate::io::vector::PolygonLayer;
use crate::types::{ZonalError, ZonalResult};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;

/// Open one image and build its table, attributing any failure to the image
pub fn process_image(
    path: &Path,
    no_data: f64,
    schema: &VariableSchema,
    layer: &PolygonLayer,
) -> ZonalResult<DataFrame> {
    let image = RasterImage::open(path, no_data).map_err(|e| ZonalError::image(path, e))?;
    if layer.same_crs_as(&image.projection()) == Some(false) {
        log::warn!(
            "Polygon layer CRS differs from {}, pixel selection may be wrong",
            image.file_name()
        );
    }
    build_image_table(&image, schema, layer).map_err(|e| ZonalError::image(path, e))
}

/// Per-image table with the header fixed by the variable schema.
///
/// Wide schemas pivot bands into columns (one row per site), long schemas
/// emit one row per site and band. Every band is read before any row is
/// produced, so a failing band yields no partial table.
pub fn build_image_table(
    image: &RasterImage,
    schema: &VariableSchema,
    layer: &PolygonLayer,
) -> ZonalResult<DataFrame> {
    let date = DateToken::from_filename(image.path());
    let image_name = image.file_name();
    log::debug!(
        "Building {} table for {} (date {})",
        schema.code,
        image_name,
        date.as_str()
    );

    let engine = OverlayEngine::new(*image.transform(), image.no_data())
        .with_categories(schema.categories);

    let mut band_records = Vec::with_capacity(schema.bands.len());
    for &band in schema.bands {
        let data = image.read_band(band)?;
        let records = engine.zonal_stats(band, &data, layer)?;
        if records.len() != layer.len() {
            return Err(ZonalError::InvalidData(format!(
                "Band {} produced {} records for {} polygons",
                band,
                records.len(),
                layer.len()
            )));
        }
        band_records.push(records);
    }

    let mut rows: Vec<SiteRow> = Vec::new();
    match schema.layout {
        Layout::Wide => {
            let mut row_of_uid: HashMap<i64, usize> = HashMap::new();
            for record in band_records.iter().flatten() {
                let position = *row_of_uid.entry(record.uid).or_insert_with(|| {
                    rows.push(SiteRow::new(record, None));
                    rows.len() - 1
                });
                rows[position].fill(schema, record);
            }
        }
        Layout::Long => {
            for record in band_records.iter().flatten() {
                let mut row = SiteRow::new(record, Some(record.band as i64));
                row.fill(schema, record);
                rows.push(row);
            }
        }
    }

    image_frame(schema, &image_name, date.as_str(), &rows)
}

/// Header-only table with the columns and types of a per-image table
pub fn empty_image_table(schema: &VariableSchema) -> ZonalResult<DataFrame> {
    image_frame(schema, "", "", &[])
}

/// One output row before it is laid out in columns
struct SiteRow {
    uid: i64,
    site: String,
    band: Option<i64>,
    values: HashMap<String, Option<f64>>,
}

impl SiteRow {
    fn new(record: &ZonalRecord, band: Option<i64>) -> Self {
        Self {
            uid: record.uid,
            site: record.site_name.clone(),
            band,
            values: HashMap::new(),
        }
    }

    fn fill(&mut self, schema: &VariableSchema, record: &ZonalRecord) {
        for &stat in schema.stats {
            self.values
                .insert(schema.stat_column(record.band, stat), record.stats.get(stat));
        }
        for label in schema.category_columns() {
            let fraction = record.stats.category(&label);
            self.values.insert(label, fraction);
        }
    }
}

fn image_frame(
    schema: &VariableSchema,
    image_name: &str,
    date: &str,
    rows: &[SiteRow],
) -> ZonalResult<DataFrame> {
    let columns: Vec<Column> = schema
        .image_columns()
        .iter()
        .map(|name| {
            let name = name.as_str();
            match name {
                "uid" => Column::new(name.into(), rows.iter().map(|r| r.uid).collect::<Vec<i64>>()),
                "site" => Column::new(
                    name.into(),
                    rows.iter().map(|r| r.site.as_str()).collect::<Vec<&str>>(),
                ),
                "image" => Column::new(name.into(), vec![image_name; rows.len()]),
                "date" => Column::new(name.into(), vec![date; rows.len()]),
                "band" => Column::new(
                    name.into(),
                    rows.iter().map(|r| r.band).collect::<Vec<Option<i64>>>(),
                ),
                stat => float_column(
                    stat,
                    rows.iter()
                        .map(|r| r.values.get(stat).copied().flatten())
                        .collect(),
                ),
            }
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}
