//! Prometheus text exposition of a scrape

use crate::collector::Scrape;
use crate::error::Result;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Content type of the rendered body
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render every observation of `scrape` in the text exposition format.
///
/// Each call builds its own registry, so concurrent renders share nothing.
pub fn render(scrape: &Scrape) -> Result<String> {
    let registry = Registry::new();
    let mut gauges: HashMap<&'static str, GaugeVec> = HashMap::new();

    for observation in scrape.observations() {
        let family = observation.family();

        let gauge = match gauges.entry(family.name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let gauge = GaugeVec::new(Opts::new(family.name, family.help), family.labels)?;
                registry.register(Box::new(gauge.clone()))?;
                entry.insert(gauge)
            }
        };

        let label_values: Vec<&str> = observation
            .label_values()
            .iter()
            .map(String::as_str)
            .collect();
        gauge
            .get_metric_with_label_values(&label_values)?
            .set(observation.value());
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{BuildInfo, MetricsSource, SpaceliftCollector};
    use crate::query::{DataPoint, DataPointMetrics, MetricsQuery, Worker, WorkerPool};
    use async_trait::async_trait;
    use spacelift_client::ClientError;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedSource(Option<MetricsQuery>);

    #[async_trait]
    impl MetricsSource for FixedSource {
        async fn fetch(&self) -> spacelift_client::Result<MetricsQuery> {
            self.0.clone().ok_or(ClientError::NoToken)
        }
    }

    async fn scrape(query: Option<MetricsQuery>) -> Scrape {
        SpaceliftCollector::new(Arc::new(FixedSource(query)), Duration::from_secs(5))
            .with_build_info(BuildInfo {
                version: "1.2.3".into(),
                commit: "abc123".into(),
            })
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_renders_successful_scrape() {
        let query = MetricsQuery {
            worker_pools: vec![WorkerPool {
                id: "wp1".into(),
                name: "Pool A".into(),
                pending_runs: 2,
                busy_workers: 1,
                workers: vec![Worker {
                    id: "w1".into(),
                    drained: true,
                }],
            }],
            ..Default::default()
        };

        let body = render(&scrape(Some(query)).await).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert!(lines.contains(
            &"spacelift_worker_pool_workers_drained{worker_pool_id=\"wp1\",worker_pool_name=\"Pool A\"} 1"
        ));
        assert!(lines.contains(&"# TYPE spacelift_public_worker_pool_parallelism gauge"));
        let build_info = lines
            .iter()
            .find(|line| line.starts_with("spacelift_build_info{"))
            .unwrap();
        assert!(build_info.contains("version=\"1.2.3\""));
        assert!(build_info.contains("commit=\"abc123\""));
        assert!(build_info.ends_with("} 1"));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("spacelift_scrape_duration_seconds ")));
        assert!(!body.contains("spacelift_error"));
    }

    #[tokio::test]
    async fn test_renders_failure_with_message_as_help() {
        let body = render(&scrape(None).await).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert!(lines.contains(&"# HELP spacelift_error Failed to request metrics from the Spacelift API"));
        assert!(lines.contains(&"spacelift_error 1"));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("spacelift_scrape_duration_seconds ")));
        assert!(!body.contains("spacelift_worker_pool"));
        assert!(!body.contains("spacelift_build_info"));
    }

    #[tokio::test]
    async fn test_repeated_label_set_keeps_last_value() {
        let point = |value| DataPoint {
            value,
            labels: vec!["FINISHED".into(), "stack-a".into(), "root".into()],
        };
        let query = MetricsQuery {
            metrics: Some(DataPointMetrics {
                stacks_count_by_state: vec![point(1.0), point(5.0)],
                resources_count_by_drift: Vec::new(),
            }),
            ..Default::default()
        };

        let body = render(&scrape(Some(query)).await).unwrap();
        let stacks: Vec<&str> = body
            .lines()
            .filter(|line| line.starts_with("spacelift_current_stacks_count_by_state{"))
            .collect();

        assert_eq!(stacks.len(), 1);
        assert!(stacks[0].contains("state=\"FINISHED\""));
        assert!(stacks[0].contains("stack=\"stack-a\""));
        assert!(stacks[0].ends_with("} 5"));
    }
}
