//! Counter/histogram taps for the deploy lifecycle (spec.md §2
//! "Telemetry taps"). One process-wide [`prometheus::Registry`]
//! behind a [`std::sync::OnceLock`], mirroring the global-handle
//! pattern `nopea_ids` uses for the identifier generator.

use prometheus::{HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub struct DeployMetrics {
    pub registry: Registry,
    pub deploy_started_total: IntCounterVec,
    pub deploy_completed_total: IntCounterVec,
    pub deploy_duration_ms: HistogramVec,
}

impl DeployMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let deploy_started_total = IntCounterVec::new(
            Opts::new("nopea_deploy_started_total", "Deploys started, labeled by service"),
            &["service"],
        )
        .expect("metric options are static and valid");
        let deploy_completed_total = IntCounterVec::new(
            Opts::new("nopea_deploy_completed_total", "Deploys finished, labeled by service and status"),
            &["service", "status"],
        )
        .expect("metric options are static and valid");
        let deploy_duration_ms = HistogramVec::new(
            prometheus::HistogramOpts::new("nopea_deploy_duration_ms", "Deploy duration in milliseconds")
                .buckets(vec![50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 30000.0, 120000.0]),
            &["service", "strategy"],
        )
        .expect("metric options are static and valid");

        registry
            .register(Box::new(deploy_started_total.clone()))
            .expect("first registration of a uniquely named metric cannot collide");
        registry
            .register(Box::new(deploy_completed_total.clone()))
            .expect("first registration of a uniquely named metric cannot collide");
        registry
            .register(Box::new(deploy_duration_ms.clone()))
            .expect("first registration of a uniquely named metric cannot collide");

        Self {
            registry,
            deploy_started_total,
            deploy_completed_total,
            deploy_duration_ms,
        }
    }
}

static METRICS: OnceLock<DeployMetrics> = OnceLock::new();

/// Returns the process-wide metrics handle, creating it on first use.
pub fn metrics() -> &'static DeployMetrics {
    METRICS.get_or_init(DeployMetrics::new)
}

pub fn record_deploy_start(service: &str) {
    metrics().deploy_started_total.with_label_values(&[service]).inc();
}

pub fn record_deploy_stop(service: &str, status: &str, strategy: &str, duration_ms: u64) {
    metrics()
        .deploy_completed_total
        .with_label_values(&[service, status])
        .inc();
    metrics()
        .deploy_duration_ms
        .with_label_values(&[service, strategy])
        .observe(duration_ms as f64);
}

/// Renders the registry in Prometheus text exposition format, for an
/// HTTP `/metrics` handler to return verbatim.
pub fn render() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = metrics().registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .expect("encoding an in-process metric family cannot fail");
    String::from_utf8(buffer).expect("prometheus text encoding is always valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_a_deploy_increments_counters() {
        record_deploy_start("svc-metrics-test");
        record_deploy_stop("svc-metrics-test", "completed", "direct", 42);
        let rendered = render();
        assert!(rendered.contains("nopea_deploy_started_total"));
        assert!(rendered.contains("nopea_deploy_completed_total"));
        assert!(rendered.contains("nopea_deploy_duration_ms"));
    }
}
