//! Metric families exported by the collector and how each is derived from
//! the query result.
//!
//! New families are added by declaring a [`MetricFamily`] and appending a
//! mapping to one of the tables below.

use crate::error::Result;
use crate::observation::{MetricFamily, Observation};
use crate::query::{DataPoint, DataPointMetrics, MetricsQuery, PublicWorkerPool, Usage, WorkerPool};
use tracing::{debug, Span};

const WORKER_POOL_LABELS: &[&str] = &["worker_pool_id", "worker_pool_name"];
const DATA_POINT_LABELS: &[&str] = &["state", "stack", "space"];

pub static PUBLIC_RUNS_PENDING: MetricFamily = MetricFamily::new(
    "spacelift_public_worker_pool_runs_pending",
    "The number of runs in your account currently queued and waiting for a public worker",
    &[],
);
pub static PUBLIC_WORKERS_BUSY: MetricFamily = MetricFamily::new(
    "spacelift_public_worker_pool_workers_busy",
    "The number of currently busy workers in the public worker pool for this account",
    &[],
);
pub static PUBLIC_PARALLELISM: MetricFamily = MetricFamily::new(
    "spacelift_public_worker_pool_parallelism",
    "The maximum number of simultaneously executing runs on the public worker pool for this account",
    &[],
);

pub static WORKER_POOL_RUNS_PENDING: MetricFamily = MetricFamily::new(
    "spacelift_worker_pool_runs_pending",
    "The number of runs currently queued and waiting for a worker from a particular pool",
    WORKER_POOL_LABELS,
);
pub static WORKER_POOL_WORKERS_BUSY: MetricFamily = MetricFamily::new(
    "spacelift_worker_pool_workers_busy",
    "The number of currently busy workers in a worker pool",
    WORKER_POOL_LABELS,
);
pub static WORKER_POOL_WORKERS: MetricFamily = MetricFamily::new(
    "spacelift_worker_pool_workers",
    "The number of workers in a worker pool",
    WORKER_POOL_LABELS,
);
pub static WORKER_POOL_WORKERS_DRAINED: MetricFamily = MetricFamily::new(
    "spacelift_worker_pool_workers_drained",
    "The number of workers in a worker pool that have been drained",
    WORKER_POOL_LABELS,
);

pub static BILLING_PERIOD_START: MetricFamily = MetricFamily::new(
    "spacelift_current_billing_period_start_timestamp_seconds",
    "The timestamp of the start of the current billing period",
    &[],
);
pub static BILLING_PERIOD_END: MetricFamily = MetricFamily::new(
    "spacelift_current_billing_period_end_timestamp_seconds",
    "The timestamp of the end of the current billing period",
    &[],
);
pub static BILLING_PERIOD_USED_PRIVATE_SECONDS: MetricFamily = MetricFamily::new(
    "spacelift_current_billing_period_used_private_seconds",
    "The amount of private worker usage in the current billing period",
    &[],
);
pub static BILLING_PERIOD_USED_PUBLIC_SECONDS: MetricFamily = MetricFamily::new(
    "spacelift_current_billing_period_used_public_seconds",
    "The amount of public worker usage in the current billing period",
    &[],
);
pub static BILLING_PERIOD_USED_SEATS: MetricFamily = MetricFamily::new(
    "spacelift_current_billing_period_used_seats",
    "The number of seats used in the current billing period",
    &[],
);
pub static BILLING_PERIOD_USED_PRIVATE_WORKERS: MetricFamily = MetricFamily::new(
    "spacelift_current_billing_period_used_private_workers",
    "The number of private workers used in the current billing period",
    &[],
);

pub static STACKS_COUNT_BY_STATE: MetricFamily = MetricFamily::new(
    "spacelift_current_stacks_count_by_state",
    "The number of stacks grouped by state",
    DATA_POINT_LABELS,
);
pub static RESOURCES_COUNT_BY_DRIFT: MetricFamily = MetricFamily::new(
    "spacelift_current_resources_count_by_drift",
    "The number of resources grouped by drift state",
    DATA_POINT_LABELS,
);

pub static SCRAPE_DURATION: MetricFamily = MetricFamily::new(
    "spacelift_scrape_duration_seconds",
    "The duration in seconds of the request to the Spacelift API for metrics",
    &[],
);
pub static BUILD_INFO: MetricFamily = MetricFamily::new(
    "spacelift_build_info",
    "Contains build information about the exporter",
    &["version", "commit"],
);

/// A gauge read straight off one node of the query result
pub struct GaugeMapping<S> {
    pub family: &'static MetricFamily,
    pub value: fn(&S) -> f64,
}

/// A family whose points carry their own label values
pub struct DataPointMapping {
    pub family: &'static MetricFamily,
    pub points: fn(&DataPointMetrics) -> &[DataPoint],
}

pub static PUBLIC_POOL_GAUGES: &[GaugeMapping<PublicWorkerPool>] = &[
    GaugeMapping {
        family: &PUBLIC_RUNS_PENDING,
        value: |pool| pool.pending_runs as f64,
    },
    GaugeMapping {
        family: &PUBLIC_WORKERS_BUSY,
        value: |pool| pool.busy_workers as f64,
    },
    GaugeMapping {
        family: &PUBLIC_PARALLELISM,
        value: |pool| pool.parallelism as f64,
    },
];

pub static ACCOUNT_GAUGES: &[GaugeMapping<Usage>] = &[
    GaugeMapping {
        family: &BILLING_PERIOD_START,
        value: |usage| usage.billing_period_start as f64,
    },
    GaugeMapping {
        family: &BILLING_PERIOD_END,
        value: |usage| usage.billing_period_end as f64,
    },
    GaugeMapping {
        family: &BILLING_PERIOD_USED_PRIVATE_SECONDS,
        value: |usage| minutes_to_seconds(usage.used_private_minutes),
    },
    GaugeMapping {
        family: &BILLING_PERIOD_USED_PUBLIC_SECONDS,
        value: |usage| minutes_to_seconds(usage.used_public_minutes),
    },
    GaugeMapping {
        family: &BILLING_PERIOD_USED_SEATS,
        value: |usage| usage.used_seats as f64,
    },
    GaugeMapping {
        family: &BILLING_PERIOD_USED_PRIVATE_WORKERS,
        value: |usage| usage.used_private_workers as f64,
    },
];

pub static WORKER_POOL_GAUGES: &[GaugeMapping<WorkerPool>] = &[
    GaugeMapping {
        family: &WORKER_POOL_RUNS_PENDING,
        value: |pool| pool.pending_runs as f64,
    },
    GaugeMapping {
        family: &WORKER_POOL_WORKERS_BUSY,
        value: |pool| pool.busy_workers as f64,
    },
    GaugeMapping {
        family: &WORKER_POOL_WORKERS,
        value: |pool| pool.workers.len() as f64,
    },
    GaugeMapping {
        family: &WORKER_POOL_WORKERS_DRAINED,
        value: |pool| pool.drained_workers() as f64,
    },
];

fn stacks_by_state(metrics: &DataPointMetrics) -> &[DataPoint] {
    &metrics.stacks_count_by_state
}

fn resources_by_drift(metrics: &DataPointMetrics) -> &[DataPoint] {
    &metrics.resources_count_by_drift
}

pub static DATA_POINT_FAMILIES: &[DataPointMapping] = &[
    DataPointMapping {
        family: &STACKS_COUNT_BY_STATE,
        points: stacks_by_state,
    },
    DataPointMapping {
        family: &RESOURCES_COUNT_BY_DRIFT,
        points: resources_by_drift,
    },
];

/// Converted in integer arithmetic so the result is exact
fn minutes_to_seconds(minutes: i64) -> f64 {
    minutes.saturating_mul(60) as f64
}

fn gauges<S>(
    mappings: &[GaugeMapping<S>],
    source: &S,
    labels: &[String],
    out: &mut Vec<Observation>,
) -> Result<()> {
    for mapping in mappings {
        out.push(Observation::new(
            mapping.family,
            (mapping.value)(source),
            labels.to_vec(),
        )?);
    }
    Ok(())
}

/// Turn a successful query result into observations.
///
/// Data points with no labels are skipped. Any other label count that does
/// not match the family fails the whole conversion.
pub fn flatten(query: &MetricsQuery, span: &Span) -> Result<Vec<Observation>> {
    let mut observations = Vec::new();

    gauges(PUBLIC_POOL_GAUGES, &query.public_worker_pool, &[], &mut observations)?;
    gauges(ACCOUNT_GAUGES, &query.usage, &[], &mut observations)?;

    for pool in &query.worker_pools {
        let labels = [pool.id.clone(), pool.name.clone()];
        gauges(WORKER_POOL_GAUGES, pool, &labels, &mut observations)?;
    }

    if let Some(metrics) = &query.metrics {
        for mapping in DATA_POINT_FAMILIES {
            for point in (mapping.points)(metrics) {
                if point.labels.is_empty() {
                    debug!(
                        parent: span,
                        family = mapping.family.name,
                        "skipping data point without labels"
                    );
                    continue;
                }

                observations.push(Observation::new(
                    mapping.family,
                    point.value,
                    point.labels.clone(),
                )?);
            }
        }
    }

    Ok(observations)
}
