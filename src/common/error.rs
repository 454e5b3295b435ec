//! Error taxonomy for the scraper. Parse failures are loud and specific:
//! a malformed archive page means the page changed, and the fix is a new
//! alias or carve-out, never a silently dropped record.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RequestError: [{status}] {url}")]
    HttpStatus { status: u16, url: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// The page no longer carries an element the extractor depends on.
    #[error("could not find {what} at {url}")]
    Structure { what: String, url: String },

    /// A table's shape violated an assumption (width, labels, parity).
    #[error("BoundsError: {0}")]
    Bounds(String),

    /// A raw header label with no canonical mapping.
    #[error("invalid label \"{label}\" for {year} {source_type} data")]
    InvalidLabel {
        label: String,
        year: i32,
        source_type: &'static str,
    },

    /// An empty cell in a column that may not be empty.
    #[error("missing value for {field} in cell {cell} on row {row} for year {year}")]
    MissingValue {
        field: String,
        cell: usize,
        row: usize,
        year: i32,
    },

    #[error("expected a number for {field} but got \"{value}\" for year {year}")]
    NumericFormat {
        field: String,
        value: String,
        year: i32,
    },

    #[error("unsupported split file format at {url}")]
    UnsupportedFormat { url: String },

    #[error("TimeFormatError: {0}")]
    TimeFormat(String),

    /// No official start instant is on record for the year.
    #[error("no official start time on record for year {0}")]
    MissingStart(i32),

    /// Sibling tasks all ran to completion; this reports every failure at
    /// once instead of just the first, one cause per line.
    #[error(
        "failed to fetch all data for {scope}: {} task(s) failed\n\t· {}",
        .failures.len(),
        .failures.join("\n\t· ")
    )]
    Aggregate { scope: String, failures: Vec<String> },
}

pub type Result<T> = std::result::Result<T, ScraperError>;
