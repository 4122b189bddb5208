use thiserror::Error;

/// Stable error taxonomy surfaced by the core (spec.md §7).
///
/// These tags are part of the external contract: CLI, HTTP, and
/// JSON-RPC adapters match on them to pick an exit code or status code,
/// so variants are never renamed without a matching change to those
/// adapters.
#[non_exhaustive]
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DeployError {
    /// An agent's waiter queue is at capacity (10 waiters).
    #[error("queue is full")]
    QueueFull,

    /// A deploy worker terminated abnormally (panicked).
    #[error("worker crashed: {reason}")]
    WorkerCrash {
        /// Human-readable panic message or join error.
        reason: String,
    },

    /// A canary/blue-green rollout was requested but no manifest of
    /// kind `Deployment` was supplied.
    #[error("no Deployment manifest found to build a rollout from")]
    NoDeploymentFound,

    /// Passthrough classification from the K8s collaborator.
    #[error("forbidden")]
    Forbidden,

    /// Passthrough classification from the K8s collaborator.
    #[error("not found")]
    NotFound,

    /// Passthrough classification from the K8s collaborator.
    #[error("timed out")]
    Timeout,

    /// Passthrough classification from the K8s collaborator.
    #[error("connection refused")]
    ConnectionRefused,

    /// Passthrough classification from the K8s collaborator.
    #[error("apply failed: {message}")]
    ApplyFailed {
        /// Collaborator-supplied failure message.
        message: String,
    },

    /// Catch-all for collaborator errors that don't map onto a more
    /// specific tag above.
    #[error("{0}")]
    Other(String),
}

impl DeployError {
    /// Short machine-readable tag, used as the occurrence artifact's
    /// `error.code` (spec.md §4.9) and for log correlation.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueueFull => "queue_full",
            Self::WorkerCrash { .. } => "worker_crash",
            Self::NoDeploymentFound => "no_deployment_found",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::ConnectionRefused => "connection_refused",
            Self::ApplyFailed { .. } => "apply_failed",
            Self::Other(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_and_matches_spec_tags() {
        assert_eq!(DeployError::QueueFull.code(), "queue_full");
        assert_eq!(
            DeployError::WorkerCrash {
                reason: "panic".into()
            }
            .code(),
            "worker_crash"
        );
        assert_eq!(DeployError::NoDeploymentFound.code(), "no_deployment_found");
    }

    #[test]
    fn serializes_with_tagged_code_field() {
        let err = DeployError::ApplyFailed {
            message: "quota exceeded".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "apply_failed");
        assert_eq!(json["message"], "quota exceeded");
    }
}
