use thiserror::Error;

use crate::models::EventCode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoringError {
    #[error("weights must each lie in [0, 100] and sum to exactly 100 (sum {total}, out of range {out_of_range:?})")]
    InvalidWeightSum {
        total: i64,
        out_of_range: Vec<EventCode>,
    },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open event log: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read event log: {0}")]
    Csv(#[from] csv::Error),

    #[error("event log is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: unparseable timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },

    #[error("row {row}: invalid event code '{value}'")]
    InvalidEventCode { row: usize, value: String },

    #[error("row {row}: empty driver identifier")]
    MissingDriver { row: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read weights file '{path}': {source}")]
    WeightsFile {
        path: String,
        source: std::io::Error,
    },

    #[error("weights file '{path}' is not a JSON object of code to percent: {source}")]
    WeightsFormat {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid weight '{0}', expected CODE=PERCENT")]
    WeightOverride(String),

    #[error("DATABASE_URL must be set to read events from Postgres (or pass --csv)")]
    MissingDatabaseUrl,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}'")]
    EnvFilter {
        value: String,
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}
