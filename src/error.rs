use std::path::PathBuf;
use thiserror::Error;

use crate::types::Category;

#[derive(Debug, Error)]
pub enum DashboardError {
    /// A column the normalizer depends on is absent from the header row.
    #[error("required column '{column}' not found in the housing table")]
    MissingColumn { column: String },

    /// No record carries a parseable completion year.
    #[error("no project has a parseable completion year; cannot build a year series")]
    EmptySeries,

    #[error("first completion year {first_year} is after the target year {target_year}")]
    EmptyYearRange { first_year: i32, target_year: i32 },

    #[error("goal for {category:?} must be positive, got {goal}")]
    InvalidGoal { category: Category, goal: f64 },

    #[error("no data loaded")]
    NoData,

    #[error("HTTP error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("geocoder response could not be parsed: {message}")]
    GeocodeParse { message: String },

    #[error("geocoder rate limit exceeded")]
    RateLimited,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DashboardError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DashboardError::Io {
            path: path.into(),
            source,
        }
    }
}
