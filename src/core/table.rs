//! Polars helpers shared by the record, assembly and export stages
//!
//! Statistics are `Float64` columns with nulls for missing values, the
//! identifier columns are `Int64` (`uid`, `band`) or `String`.

use crate::types::ZonalResult;
use polars::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Float column, `None` becomes null
pub fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Column::new(name.into(), values)
}

/// Values of a float column top to bottom
pub fn float_values(df: &DataFrame, name: &str) -> ZonalResult<Vec<Option<f64>>> {
    Ok(df.column(name)?.f64()?.into_iter().collect())
}

/// Values of a string column top to bottom
pub fn text_values(df: &DataFrame, name: &str) -> ZonalResult<Vec<Option<String>>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|c| c.to_string()).collect()
}

/// Write a frame as CSV with a header row. Nulls are empty fields.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> ZonalResult<()> {
    let file = File::create(path)?;
    write_csv_to(df, file)
}

pub fn write_csv_to<W: Write>(df: &mut DataFrame, writer: W) -> ZonalResult<()> {
    CsvWriter::new(writer).include_header(true).finish(df)?;
    Ok(())
}
