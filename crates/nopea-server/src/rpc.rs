//! Line-oriented JSON-RPC 2.0 tool-call surface (spec.md §6): one
//! request per line on stdin, one response per line on stdout.
//! Notifications (no `id`) produce no response line.

use crate::app::AppState;
use nopea_core::{DeployContext, DeployOptions, DeploySpec, Strategy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const TOOL_ERROR: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

fn ok(id: Value, result: Value) -> RpcResponse {
    RpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None }
}

fn err(id: Value, code: i64, message: impl Into<String>) -> RpcResponse {
    RpcResponse { jsonrpc: "2.0", id, result: None, error: Some(RpcError { code, message: message.into() }) }
}

const TOOL_NAMES: &[&str] = &["nopea_deploy", "nopea_context", "nopea_history", "nopea_health", "nopea_explain"];

fn tool_descriptors() -> Value {
    json!([
        {"name": "nopea_deploy", "description": "Deploy a service's manifests"},
        {"name": "nopea_context", "description": "Fetch a service's deploy history context"},
        {"name": "nopea_history", "description": "List a service's past deploys"},
        {"name": "nopea_health", "description": "Report the health of every running agent"},
        {"name": "nopea_explain", "description": "Explain the outcome of a service's most recent deploy"},
    ])
}

/// Dispatches one parsed request. Returns `None` for a notification
/// (`method` starting with `notifications/`, or any request with no
/// `id`), matching JSON-RPC 2.0's "no response" rule.
pub async fn dispatch(state: &AppState, request: RpcRequest) -> Option<RpcResponse> {
    let is_notification = request.id.is_none();
    let id = request.id.clone().unwrap_or(Value::Null);

    let response = match request.method.as_str() {
        "initialize" => ok(id, json!({"protocolVersion": "2024-11-05", "serverInfo": {"name": "nopea", "version": "1.0"}})),
        "notifications/initialized" => return None,
        "tools/list" => ok(id, json!({"tools": tool_descriptors()})),
        "tools/call" => handle_tool_call(state, id, &request.params).await,
        _ => err(id, METHOD_NOT_FOUND, format!("unknown method: {}", request.method)),
    };

    if is_notification {
        None
    } else {
        Some(response)
    }
}

async fn handle_tool_call(state: &AppState, id: Value, params: &Value) -> RpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return err(id, TOOL_ERROR, "missing tool name");
    };
    if !TOOL_NAMES.contains(&name) {
        return err(id, TOOL_ERROR, format!("unknown tool: {name}"));
    }
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let result = match name {
        "nopea_deploy" => call_deploy(state, &arguments).await,
        "nopea_context" => call_context(state, &arguments).await,
        "nopea_history" => call_history(state, &arguments),
        "nopea_health" => call_health(state).await,
        "nopea_explain" => call_explain(state, &arguments).await,
        _ => unreachable!("checked above"),
    };

    match result {
        Ok(value) => ok(id, value),
        Err(message) => err(id, TOOL_ERROR, message),
    }
}

fn required_service(arguments: &Value) -> Result<String, String> {
    arguments
        .get("service")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| "service is required".to_string())
}

fn namespace_of(arguments: &Value) -> String {
    arguments.get("namespace").and_then(Value::as_str).unwrap_or("default").to_string()
}

async fn call_deploy(state: &AppState, arguments: &Value) -> Result<Value, String> {
    let service = required_service(arguments)?;
    let namespace = namespace_of(arguments);
    let manifests = arguments.get("manifests").and_then(Value::as_array).cloned().unwrap_or_default();
    let strategy = arguments.get("strategy").and_then(Value::as_str).map(Strategy::parse);

    let spec = DeploySpec {
        service: service.clone(),
        namespace,
        manifests,
        strategy,
        options: DeployOptions::default(),
        timeout_ms: nopea_core::DEFAULT_TIMEOUT_MS,
    };
    let result = state.agents.deploy(&service, spec).await;
    serde_json::to_value(&result).map_err(|e| e.to_string())
}

async fn call_context(state: &AppState, arguments: &Value) -> Result<Value, String> {
    let service = required_service(arguments)?;
    let namespace = namespace_of(arguments);
    let context = state.deploy_context(&service, &namespace).await;
    serde_json::to_value(&context).map_err(|e| e.to_string())
}

fn call_history(state: &AppState, arguments: &Value) -> Result<Value, String> {
    let service = required_service(arguments)?;
    let deployments = state.cache.list_deployments(&service);
    Ok(json!({"service": service, "deployments": deployments}))
}

async fn call_health(state: &AppState) -> Result<Value, String> {
    let reports = state.agents.health().await;
    serde_json::to_value(reports).map_err(|e| e.to_string())
}

async fn call_explain(state: &AppState, arguments: &Value) -> Result<Value, String> {
    let service = required_service(arguments)?;
    let namespace = namespace_of(arguments);
    let last = state
        .cache
        .list_deployments(&service)
        .into_iter()
        .last()
        .ok_or_else(|| format!("no deploys recorded for {service}"))?;
    let context: DeployContext = state.deploy_context(&service, &namespace).await;
    let occurrence = nopea_occurrence::build(&last.deploy_id, &last, &last.applied_resources, Some(&context));
    serde_json::to_value(&occurrence).map_err(|e| e.to_string())
}

/// Runs the stdio loop until the reader hits EOF. Generic over the
/// reader/writer so tests can drive it over an in-memory buffer
/// instead of real stdio.
pub async fn run_stdio_loop<R, W>(state: AppState, reader: R, mut writer: W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "stdio transport read error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch(&state, request).await,
            Err(_) => Some(err(Value::Null, PARSE_ERROR, "invalid JSON-RPC request")),
        };

        if let Some(response) = response {
            let Ok(mut encoded) = serde_json::to_string(&response) else { continue };
            encoded.push('\n');
            if writer.write_all(encoded.as_bytes()).await.is_err() {
                break;
            }
        }
    }
}
