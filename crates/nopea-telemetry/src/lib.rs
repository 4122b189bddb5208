//! Telemetry taps (spec.md §2, §4.6 steps 4/8): Prometheus
//! counters/histograms plus the optional CDEvents HTTP sink.

pub mod cdevents;
pub mod metrics;

pub use cdevents::{CdEventsEmitter, DeploymentEventKind, ServiceEventKind};
pub use metrics::{metrics, record_deploy_start, record_deploy_stop, render};
