//! GraphQL query issued on every scrape and the shape of its result

use serde::{Deserialize, Deserializer};

/// Document sent to the Spacelift API on every scrape
pub const METRICS_QUERY: &str = r#"query SpaceliftMetrics {
  publicWorkerPool {
    parallelism
    busyWorkers
    pendingRuns
  }
  workerPools {
    id
    name
    pendingRuns
    busyWorkers
    workers {
      id
      drained
    }
  }
  usage {
    billingPeriodStart
    billingPeriodEnd
    usedPrivateMinutes
    usedPublicMinutes
    usedSeats
    usedWorkers
  }
  metrics {
    stacksCountByState {
      value
      labels
    }
    resourcesCountByDrift {
      value
      labels
    }
  }
}"#;

/// GraphQL lists may come back as `null`
fn nullable_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub public_worker_pool: PublicWorkerPool,
    #[serde(default, deserialize_with = "nullable_list")]
    pub worker_pools: Vec<WorkerPool>,
    pub usage: Usage,
    #[serde(default)]
    pub metrics: Option<DataPointMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicWorkerPool {
    pub parallelism: i64,
    pub busy_workers: i64,
    pub pending_runs: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPool {
    pub id: String,
    pub name: String,
    pub pending_runs: i64,
    pub busy_workers: i64,
    #[serde(default, deserialize_with = "nullable_list")]
    pub workers: Vec<Worker>,
}

impl WorkerPool {
    pub fn drained_workers(&self) -> usize {
        self.workers.iter().filter(|worker| worker.drained).count()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Worker {
    pub id: String,
    pub drained: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Unix timestamp
    pub billing_period_start: i64,
    /// Unix timestamp
    pub billing_period_end: i64,
    pub used_private_minutes: i64,
    pub used_public_minutes: i64,
    pub used_seats: i64,
    #[serde(rename = "usedWorkers")]
    pub used_private_workers: i64,
}

/// Pre-aggregated data points, each carrying its own label values
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointMetrics {
    #[serde(default, deserialize_with = "nullable_list")]
    pub stacks_count_by_state: Vec<DataPoint>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub resources_count_by_drift: Vec<DataPoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataPoint {
    pub value: f64,
    #[serde(default, deserialize_with = "nullable_list")]
    pub labels: Vec<String>,
}
