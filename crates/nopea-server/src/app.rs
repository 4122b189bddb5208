//! HTTP API (spec.md §6): `/health`, `/ready`, `/api/deploy`,
//! `/api/context/{service}`, `/api/history/{service}`, 404 fallback.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use nopea_agent::AgentRegistry;
use nopea_cache::Cache;
use nopea_core::{DeployContext, DeployOptions, DeploySpec, Manifest, Strategy};
use nopea_memory::MemoryHandle;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// State shared across every HTTP and JSON-RPC handler.
#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<AgentRegistry>,
    pub memory: Option<MemoryHandle>,
    pub cache: Arc<Cache>,
}

impl AppState {
    #[must_use]
    pub fn new(agents: Arc<AgentRegistry>, memory: Option<MemoryHandle>, cache: Arc<Cache>) -> Self {
        Self { agents, memory, cache }
    }

    pub async fn deploy_context(&self, service: &str, namespace: &str) -> DeployContext {
        match &self.memory {
            Some(memory) => memory.get_deploy_context(&service.to_string(), &namespace.to_string()).await,
            None => DeployContext::empty(&service.to_string(), &namespace.to_string()),
        }
    }
}

/// Permissive CORS, development-only. Logged every time the router is
/// built so the tradeoff isn't silent.
fn cors_layer() -> CorsLayer {
    tracing::warn!("HTTP API is running with permissive CORS (allow all origins)");
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/api/deploy", post(deploy_handler))
        .route("/api/context/:service", get(context_handler))
        .route("/api/history/:service", get(history_handler))
        .fallback(not_found_handler)
        .layer(cors_layer())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.cache.available() {
        (StatusCode::OK, Json(json!({"status": "ready"})))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not_ready"})))
    }
}

#[derive(Debug, Deserialize)]
pub struct DeployRequestBody {
    pub service: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub manifests: Vec<Manifest>,
    pub strategy: Option<String>,
}

async fn deploy_handler(State(state): State<AppState>, Json(body): Json<DeployRequestBody>) -> impl IntoResponse {
    let Some(service) = body.service.filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "service is required"})));
    };

    let spec = DeploySpec {
        service: service.clone(),
        namespace: body.namespace.unwrap_or_else(|| "default".to_string()),
        manifests: body.manifests,
        strategy: body.strategy.as_deref().map(Strategy::parse),
        options: DeployOptions::default(),
        timeout_ms: nopea_core::DEFAULT_TIMEOUT_MS,
    };

    let result = state.agents.deploy(&service, spec).await;
    (StatusCode::OK, Json(serde_json::to_value(&result).unwrap_or(Value::Null)))
}

async fn context_handler(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let namespace = params.get("namespace").cloned().unwrap_or_else(|| "default".to_string());
    let context = state.deploy_context(&service, &namespace).await;
    (StatusCode::OK, Json(serde_json::to_value(&context).unwrap_or(Value::Null)))
}

async fn history_handler(State(state): State<AppState>, Path(service): Path<String>) -> impl IntoResponse {
    let deployments = state.cache.list_deployments(&service);
    let agent_status = state.agents.status(&service).await;
    (
        StatusCode::OK,
        Json(json!({
            "service": service,
            "state": agent_status.map(|s| s.status),
            "deployments": deployments,
        })),
    )
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use nopea_k8s::NullK8sClient;
    use nopea_orchestrator::Orchestrator;
    use nopea_telemetry::CdEventsEmitter;
    use tower::ServiceExt;

    fn state() -> AppState {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(Cache::new());
        let mut orchestrator = Orchestrator::new(
            Arc::new(NullK8sClient::new()),
            cache.clone(),
            None,
            CdEventsEmitter::new(None),
        );
        orchestrator.occurrence_root = tmp.keep();
        let agents = Arc::new(AgentRegistry::new(Arc::new(orchestrator), cache.clone()));
        AppState::new(agents, None, cache)
    }

    #[tokio::test]
    async fn health_returns_ok_status() {
        let app = build_router(state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unmatched_route_returns_404_not_found_body() {
        let app = build_router(state());
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deploy_without_service_is_bad_request() {
        let app = build_router(state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/deploy")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deploy_with_service_completes() {
        let app = build_router(state());
        let body = json!({"service": "api-gw", "manifests": [{"kind": "Deployment", "metadata": {"name": "api-gw"}}]});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/deploy")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
