//! Acquisition date windows from raster filenames
//!
//! Mosaic filenames carry their date as the second-to-last `_` token, e.g.
//! `lztmre_nt_m201901201903_dkaa2.img`. Seasonal composites prefix the token
//! with `m` and encode `YYYYMMYYYYMM`; annual products use a bare year.

use chrono::{Datelike, NaiveDate};
use std::path::Path;

const SEASONAL_MARKER: char = 'm';

/// Date token classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateToken {
    /// Start and end year-month, marker stripped
    Seasonal(String),
    /// Bare four character year
    Annual(String),
    /// Anything else, kept verbatim
    SingleDate(String),
}

impl DateToken {
    /// Classify a raw filename token
    pub fn classify(token: &str) -> Self {
        if let Some(rest) = token.strip_prefix(SEASONAL_MARKER) {
            DateToken::Seasonal(rest.to_string())
        } else if token.chars().count() == 4 {
            DateToken::Annual(token.to_string())
        } else {
            DateToken::SingleDate(token.to_string())
        }
    }

    /// Extract and classify the date token of an image path
    pub fn from_filename<P: AsRef<Path>>(path: P) -> Self {
        Self::classify(&date_token(path.as_ref()))
    }

    /// Value written to the `date` column
    pub fn as_str(&self) -> &str {
        match self {
            DateToken::Seasonal(s) | DateToken::Annual(s) | DateToken::SingleDate(s) => s,
        }
    }

    /// Start / end window covered by the token.
    ///
    /// Returns `None` (with a warning) when the token cannot be decoded; the
    /// image is still processed, only its derived date fields are missing.
    pub fn window(&self) -> Option<DateWindow> {
        let window = match self {
            DateToken::Seasonal(s) => seasonal_window(s),
            DateToken::Annual(s) => annual_window(s),
            DateToken::SingleDate(s) => single_date_window(s),
        };
        if window.is_none() {
            log::warn!("Could not derive a date window from token '{}' ({:?})", self.as_str(), self);
        }
        window
    }
}

/// Inclusive acquisition window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn start_date(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    pub fn end_date(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }

    /// `(day, month, year)` of the start date as zero-padded strings
    pub fn start_parts(&self) -> (String, String, String) {
        date_parts(self.start)
    }

    /// `(day, month, year)` of the end date as zero-padded strings
    pub fn end_parts(&self) -> (String, String, String) {
        date_parts(self.end)
    }
}

fn date_parts(date: NaiveDate) -> (String, String, String) {
    (
        format!("{:02}", date.day()),
        format!("{:02}", date.month()),
        format!("{:04}", date.year()),
    )
}

/// Second-to-last `_` token of the file stem.
pub fn date_token(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 2 {
        log::warn!(
            "Filename {} has no date token field, using the whole stem",
            path.display()
        );
        return stem;
    }
    parts[parts.len() - 2].to_string()
}

/// Last calendar day of a month
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

fn digits(token: &str, range: std::ops::Range<usize>) -> Option<u32> {
    let slice = token.get(range)?;
    if slice.is_empty() || !slice.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    slice.parse().ok()
}

fn seasonal_window(token: &str) -> Option<DateWindow> {
    let start_year = digits(token, 0..4)? as i32;
    let start_month = digits(token, 4..6)?;
    let end_year = digits(token, 6..10)? as i32;
    let end_month = digits(token, 10..12)?;

    let start = NaiveDate::from_ymd_opt(start_year, start_month, 1)?;
    let end = last_day_of_month(end_year, end_month)?;
    Some(DateWindow { start, end })
}

fn annual_window(token: &str) -> Option<DateWindow> {
    let year = digits(token, 0..4)? as i32;
    Some(DateWindow {
        start: NaiveDate::from_ymd_opt(year, 1, 1)?,
        end: NaiveDate::from_ymd_opt(year, 12, 31)?,
    })
}

fn single_date_window(token: &str) -> Option<DateWindow> {
    if token.len() != 8 {
        return None;
    }
    let date = NaiveDate::parse_from_str(token, "%Y%m%d").ok()?;
    Some(DateWindow { start: date, end: date })
}
