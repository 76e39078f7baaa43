//! # Spacelift metrics
//!
//! Scrape pipeline for the exporter: fetch account data from the Spacelift
//! API, map it onto Prometheus gauge families and render the result.

mod collector;
mod error;
pub mod exposition;
pub mod families;
mod observation;
pub mod query;

pub use collector::{BuildInfo, FailureReason, MetricsSource, Scrape, SpaceliftCollector};
pub use error::{MetricsError, Result};
pub use observation::{MetricFamily, Observation};
