//! Shared types, error taxonomy, and configuration for the `nopea`
//! deploy orchestrator. Every other crate in the workspace depends on
//! this one to avoid duplicating the wire types that cross crate
//! boundaries (deploy specs/results, the error taxonomy, config).

pub mod config;
pub mod envelope;
pub mod error;
pub mod types;

pub use config::Config;
pub use envelope::EnvelopeError;
pub use error::DeployError;
pub use types::{
    resource_key, ActiveSlot, Dependency, DeployContext, DeployOptions, DeploySpec, DeployStatus,
    DeployResult, FailurePattern, Manifest, Namespace, ServiceName, Strategy,
    DEFAULT_CANARY_STEPS, DEFAULT_NAMESPACE, DEFAULT_TIMEOUT_MS,
};
