pub mod feed;
pub mod loader;
pub mod quality;

pub use feed::{DataFeed, InMemoryDataFeed};
pub use loader::{load_csv, write_csv, CsvDataFeed};
pub use quality::{BarAssessment, BarValidator, QualityIssue};

use crate::events::BarError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read data file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to parse timestamp '{value}' at line {line}")]
    Timestamp { line: usize, value: String },
    #[error("Invalid bar at line {line}: {source}")]
    InvalidBar {
        line: usize,
        #[source]
        source: BarError,
    },
}
