//! Outbound CDEvents HTTP emission (spec.md §6 "Wire events"). An
//! external collaborator fire-and-forget sink — failures are logged
//! at warning and never affect the deploy whose event didn't send.

use nopea_core::DeployStatus;
use serde_json::{json, Value};

const SPEC_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEventKind {
    Started,
    Completed,
    Failed,
    RolledBack,
}

impl DeploymentEventKind {
    fn type_name(self) -> &'static str {
        match self {
            Self::Started => "dev.cdevents.deployment.started.0.1.0",
            Self::Completed => "dev.cdevents.deployment.completed.0.1.0",
            Self::Failed => "dev.cdevents.deployment.failed.0.1.0",
            Self::RolledBack => "dev.cdevents.deployment.rolledback.0.1.0",
        }
    }

    #[must_use]
    pub fn for_status(status: DeployStatus) -> Self {
        match status {
            DeployStatus::Completed => Self::Completed,
            DeployStatus::Failed => Self::Failed,
            DeployStatus::RolledBack => Self::RolledBack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEventKind {
    Deployed,
    Upgraded,
}

impl ServiceEventKind {
    fn type_name(self) -> &'static str {
        match self {
            Self::Deployed => "dev.cdevents.service.deployed.0.3.0",
            Self::Upgraded => "dev.cdevents.service.upgraded.0.3.0",
        }
    }
}

fn envelope(type_name: &str, subject_id: &str, extra: Value) -> Value {
    json!({
        "context": {
            "version": SPEC_VERSION,
            "id": nopea_ids::next_id().to_string(),
            "source": "nopea",
            "type": type_name,
        },
        "subject": {
            "id": subject_id,
            "content": extra,
        },
    })
}

/// Fire-and-forget HTTP sink, enabled iff `cdevents_endpoint` is
/// configured (spec.md §6). Each `emit_*` call spawns its own task so
/// callers never block on network I/O.
#[derive(Debug, Clone)]
pub struct CdEventsEmitter {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl CdEventsEmitter {
    #[must_use]
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn emit_deployment_event(&self, kind: DeploymentEventKind, service: &str) {
        self.emit(kind.type_name(), service, json!({}));
    }

    pub fn emit_service_event(&self, kind: ServiceEventKind, service: &str) {
        self.emit(kind.type_name(), service, json!({}));
    }

    fn emit(&self, type_name: &str, subject_id: &str, extra: Value) {
        let Some(endpoint) = self.endpoint.clone() else { return };
        let body = envelope(type_name, subject_id, extra);
        let client = self.client.clone();
        let type_name = type_name.to_string();
        tokio::spawn(async move {
            if let Err(err) = client.post(&endpoint).json(&body).send().await {
                tracing::warn!(%err, event = %type_name, "CDEvents emission failed");
            }
        });
    }
}
