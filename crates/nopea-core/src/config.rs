use serde::{Deserialize, Serialize};

/// Which K8s collaborator implementation to wire up at startup
/// (spec.md §6, `k8s_module`). The real server-side-apply client lives
/// outside this crate's scope (spec.md §1); `Null` selects the
/// in-process test double shipped in `nopea-k8s`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum K8sModule {
    #[default]
    Null,
    Configured,
}

/// Process-wide configuration (spec.md §6 "Environment / configuration
/// options"). Populated from environment variables with typed
/// defaults; there is no config-file layer — every field is read from
/// `std::env::var`, falling back to a constant, parsed into a typed
/// field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener port (`API_PORT`, default 4000).
    pub api_port: u16,
    /// Optional K8s connection handle override (`K8S_CONN`).
    pub k8s_conn: Option<String>,
    /// K8s collaborator implementation selector (`K8S_MODULE`).
    pub k8s_module: K8sModule,
    /// Optional CDEvents HTTP sink (`CDEVENTS_ENDPOINT`). Presence
    /// enables async CDEvents emission.
    pub cdevents_endpoint: Option<String>,
    /// Enables registry/supervisor replication (`CLUSTER_ENABLED`).
    pub cluster_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_port: 4000,
            k8s_conn: None,
            k8s_module: K8sModule::default(),
            cdevents_endpoint: None,
            cluster_enabled: false,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_port: std::env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.api_port),
            k8s_conn: std::env::var("K8S_CONN").ok(),
            k8s_module: match std::env::var("K8S_MODULE").as_deref() {
                Ok("configured") => K8sModule::Configured,
                _ => K8sModule::Null,
            },
            cdevents_endpoint: std::env::var("CDEVENTS_ENDPOINT").ok(),
            cluster_enabled: std::env::var("CLUSTER_ENABLED")
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.cluster_enabled),
        }
    }
}
