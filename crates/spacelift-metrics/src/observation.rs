//! Metric families and the observations produced for them

use crate::error::{MetricsError, Result};

/// A named gauge with a fixed set of label keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl MetricFamily {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }

    /// Number of label values every observation must carry
    pub fn arity(&self) -> usize {
        self.labels.len()
    }
}

/// One labeled value of a family, valid for a single scrape
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    family: &'static MetricFamily,
    value: f64,
    label_values: Vec<String>,
}

impl Observation {
    /// Create an observation, rejecting label values that do not match the
    /// family's arity.
    pub fn new(
        family: &'static MetricFamily,
        value: f64,
        label_values: Vec<String>,
    ) -> Result<Self> {
        if label_values.len() != family.arity() {
            return Err(MetricsError::ArityMismatch {
                family: family.name,
                expected: family.arity(),
                actual: label_values.len(),
            });
        }

        Ok(Self {
            family,
            value,
            label_values,
        })
    }

    /// Observation for a family whose label count is known at compile time.
    ///
    /// Callers pass exactly one value per declared label key.
    pub(crate) fn fixed<const N: usize>(
        family: &'static MetricFamily,
        value: f64,
        label_values: [String; N],
    ) -> Self {
        debug_assert_eq!(
            N,
            family.arity(),
            "metric {} declares {} labels",
            family.name,
            family.arity()
        );

        Self {
            family,
            value,
            label_values: label_values.into(),
        }
    }

    pub fn family(&self) -> &'static MetricFamily {
        self.family
    }

    pub fn name(&self) -> &'static str {
        self.family.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }
}
