//! Error types for the scrape pipeline

use thiserror::Error;

/// Result type alias for metric construction and exposition
pub type Result<T> = std::result::Result<T, MetricsError>;

#[derive(Error, Debug)]
pub enum MetricsError {
    /// Label values do not match the family's declared label keys
    #[error("metric {family} expects {expected} label values, got {actual}")]
    ArityMismatch {
        family: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The Prometheus registry or encoder rejected the data
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The encoder produced invalid UTF-8
    #[error("exposition output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
