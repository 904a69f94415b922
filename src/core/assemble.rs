//! Time series assembly
//!
//! Stacks the per-image tables of a collection and turns them into the
//! exported column layout: decomposed date fields, unit corrections, zero
//! minimum masking, row ordering and the canonical column order.

use crate::config::PipelineConfig;
use crate::core::date_parser::{DateToken, DateWindow};
use crate::core::records::empty_image_table;
use crate::core::table::{float_column, float_values};
use crate::core::variables::{VariableSchema, DATE_COLUMNS};
use crate::types::{ZonalError, ZonalResult};
use polars::prelude::*;
use std::collections::HashMap;

/// Concatenated per-image tables of one variable
#[derive(Debug, Clone)]
pub struct TimeSeries {
    schema: &'static VariableSchema,
    table: DataFrame,
    offset_applied: bool,
}

impl TimeSeries {
    /// Stack the per-image tables and insert the decomposed date fields
    pub fn from_image_tables(
        schema: &'static VariableSchema,
        tables: Vec<DataFrame>,
    ) -> ZonalResult<Self> {
        let image_count = tables.len();
        let mut frames = vec![empty_image_table(schema)?.lazy()];
        frames.extend(tables.into_iter().map(|df| df.lazy()));
        let mut table = concat(&frames, UnionArgs::default())?.collect()?;

        insert_date_columns(&mut table)?;
        log::info!(
            "Assembled {} rows from {} {} image tables",
            table.height(),
            image_count,
            schema.code
        );

        Ok(Self {
            schema,
            table,
            offset_applied: false,
        })
    }

    pub fn table(&self) -> &DataFrame {
        &self.table
    }

    pub fn offset_applied(&self) -> bool {
        self.offset_applied
    }

    /// Subtract the schema's storage offset from the location statistics.
    ///
    /// A schema without an offset is a configuration error. Refused once the
    /// offset has been removed from this table.
    pub fn apply_unit_offset(&mut self) -> ZonalResult<()> {
        let Some(offset) = self.schema.unit_offset else {
            return Err(ZonalError::Config(format!(
                "Variable {} declares no unit offset to remove",
                self.schema.code
            )));
        };
        if self.offset_applied {
            return Err(ZonalError::OffsetAlreadyApplied(self.schema.code.to_string()));
        }

        for column in self.schema.offset_columns() {
            let shifted = float_values(&self.table, &column)?
                .into_iter()
                .map(|v| v.map(|v| v - offset))
                .collect();
            self.table.with_column(float_column(&column, shifted))?;
        }
        self.offset_applied = true;
        log::info!("Removed unit offset {} from {} statistics", offset, self.schema.code);
        Ok(())
    }

    /// Replace a minimum of exactly zero with a missing value
    pub fn mask_zero_minimum(&mut self) -> ZonalResult<()> {
        if !self.schema.zero_min_is_missing {
            return Ok(());
        }
        for column in self.schema.min_columns() {
            let masked = float_values(&self.table, &column)?
                .into_iter()
                .map(|v| v.filter(|v| *v != 0.0))
                .collect();
            self.table.with_column(float_column(&column, masked))?;
        }
        Ok(())
    }

    /// Sort by `(uid, start_date, image)` and project onto the canonical columns
    pub fn finish(self) -> ZonalResult<DataFrame> {
        let sorted = self.table.sort(
            ["uid", "start_date", "image"],
            SortMultipleOptions::default()
                .with_nulls_last(true)
                .with_maintain_order(true),
        )?;
        Ok(sorted.select(self.schema.canonical_columns())?)
    }
}

/// Full assembly of a collection as configured for the run
pub fn assemble(
    schema: &'static VariableSchema,
    tables: Vec<DataFrame>,
    config: &PipelineConfig,
) -> ZonalResult<DataFrame> {
    let mut series = TimeSeries::from_image_tables(schema, tables)?;
    if config.offset_enabled_for(schema.code) {
        series.apply_unit_offset()?;
    } else if schema.unit_offset.is_some() {
        log::debug!("Unit offset correction disabled for {}", schema.code);
    }
    series.mask_zero_minimum()?;
    series.finish()
}

fn insert_date_columns(table: &mut DataFrame) -> ZonalResult<()> {
    let date_index = table
        .get_column_index("date")
        .ok_or_else(|| ZonalError::InvalidData("Image tables have no date column".to_string()))?;

    // The date column holds the token with its seasonal marker stripped, so
    // the window is classified again from the image filename.
    let mut windows: HashMap<String, Option<DateWindow>> = HashMap::new();
    let mut fields: Vec<[Option<String>; 8]> = Vec::with_capacity(table.height());
    for image in table.column("image")?.str()? {
        let window = match image {
            Some(image) => *windows
                .entry(image.to_string())
                .or_insert_with(|| DateToken::from_filename(image).window()),
            None => None,
        };
        fields.push(date_fields(window));
    }

    for (offset, name) in DATE_COLUMNS.iter().enumerate() {
        let values: Vec<Option<String>> = fields.iter().map(|f| f[offset].clone()).collect();
        table.insert_column(date_index + 1 + offset, Column::new((*name).into(), values))?;
    }
    Ok(())
}

fn date_fields(window: Option<DateWindow>) -> [Option<String>; 8] {
    match window {
        Some(window) => {
            let (start_day, start_month, start_year) = window.start_parts();
            let (end_day, end_month, end_year) = window.end_parts();
            [
                Some(start_day),
                Some(start_month),
                Some(start_year),
                Some(window.start_date()),
                Some(end_day),
                Some(end_month),
                Some(end_year),
                Some(window.end_date()),
            ]
        }
        None => std::array::from_fn(|_| None),
    }
}
