//! One scrape cycle: query the API under a deadline and turn the outcome
//! into observations.

use crate::families::{self, BUILD_INFO, SCRAPE_DURATION};
use crate::observation::{MetricFamily, Observation};
use crate::query::{MetricsQuery, METRICS_QUERY};
use async_trait::async_trait;
use spacelift_client::{AuthenticatedClient, ErrorKind, GraphQlRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, Span};

/// Where a scrape gets its data from
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self) -> spacelift_client::Result<MetricsQuery>;
}

#[async_trait]
impl MetricsSource for AuthenticatedClient {
    async fn fetch(&self) -> spacelift_client::Result<MetricsQuery> {
        self.query(&GraphQlRequest::new(METRICS_QUERY)).await
    }
}

static TIMEOUT_ERROR: MetricFamily = MetricFamily::new(
    "spacelift_error",
    "The request to the Spacelift API for metric data timed out",
    &[],
);
static REQUEST_ERROR: MetricFamily = MetricFamily::new(
    "spacelift_error",
    "Failed to request metrics from the Spacelift API",
    &[],
);
static INVALID_DATA_ERROR: MetricFamily = MetricFamily::new(
    "spacelift_error",
    "The Spacelift API returned data that could not be mapped to metrics",
    &[],
);

/// Why a scrape produced no domain observations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    RequestFailed,
    InvalidData,
}

impl FailureReason {
    fn family(self) -> &'static MetricFamily {
        match self {
            Self::Timeout => &TIMEOUT_ERROR,
            Self::RequestFailed => &REQUEST_ERROR,
            Self::InvalidData => &INVALID_DATA_ERROR,
        }
    }

    /// Human readable message, also used as the error gauge's help text
    pub fn message(self) -> &'static str {
        self.family().help
    }
}

/// Everything one cycle emits
#[derive(Debug, Clone)]
pub struct Scrape {
    observations: Vec<Observation>,
    failure: Option<FailureReason>,
    duration: Duration,
}

impl Scrape {
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Labels of `spacelift_build_info`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
}

impl BuildInfo {
    /// Build info for `version`, with the commit taken from
    /// `SPACELIFT_PROMEX_COMMIT` at compile time.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            commit: option_env!("SPACELIFT_PROMEX_COMMIT")
                .unwrap_or("devel")
                .to_string(),
        }
    }
}

pub struct SpaceliftCollector {
    source: Arc<dyn MetricsSource>,
    scrape_timeout: Duration,
    build_info: BuildInfo,
    span: Span,
}

impl SpaceliftCollector {
    pub fn new(source: Arc<dyn MetricsSource>, scrape_timeout: Duration) -> Self {
        Self {
            source,
            scrape_timeout,
            build_info: BuildInfo::new(env!("CARGO_PKG_VERSION")),
            span: Span::none(),
        }
    }

    pub fn with_build_info(mut self, build_info: BuildInfo) -> Self {
        self.build_info = build_info;
        self
    }

    /// Emit log events under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Run one scrape cycle. Failures are reported inside the returned
    /// [`Scrape`], never as an error.
    pub async fn collect(&self) -> Scrape {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.scrape_timeout, self.source.fetch()).await;
        let duration = start.elapsed();

        let result = match outcome {
            Err(_) => {
                error!(
                    parent: &self.span,
                    timeout_ms = self.scrape_timeout.as_millis() as u64,
                    "{}",
                    FailureReason::Timeout.message()
                );
                Err(FailureReason::Timeout)
            }
            Ok(Err(err)) => {
                let reason = match err.kind() {
                    ErrorKind::DeadlineExceeded => FailureReason::Timeout,
                    _ => FailureReason::RequestFailed,
                };
                error!(parent: &self.span, error = %err, "{}", reason.message());
                Err(reason)
            }
            Ok(Ok(query)) => families::flatten(&query, &self.span).map_err(|err| {
                error!(
                    parent: &self.span,
                    error = %err,
                    "{}",
                    FailureReason::InvalidData.message()
                );
                FailureReason::InvalidData
            }),
        };

        let (mut observations, failure) = match result {
            Ok(mut observations) => {
                observations.push(self.build_info_observation());
                (observations, None)
            }
            Err(reason) => (vec![Observation::fixed(reason.family(), 1.0, [])], Some(reason)),
        };

        observations.push(Observation::fixed(
            &SCRAPE_DURATION,
            duration.as_secs_f64(),
            [],
        ));

        Scrape {
            observations,
            failure,
            duration,
        }
    }

    fn build_info_observation(&self) -> Observation {
        Observation::fixed(
            &BUILD_INFO,
            1.0,
            [self.build_info.version.clone(), self.build_info.commit.clone()],
        )
    }
}
