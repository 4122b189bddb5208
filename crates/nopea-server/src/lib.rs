//! HTTP API and JSON-RPC tool-call surface (spec.md §6), built over
//! [`nopea_agent::AgentRegistry`].

pub mod app;
pub mod rpc;

pub use app::{build_router, AppState};
pub use rpc::{dispatch, run_stdio_loop, RpcRequest, RpcResponse};

/// Binds and serves the HTTP API until the process is killed
/// (spec.md §6 CLI `serve`).
pub async fn serve_http(state: AppState, port: u16) -> std::io::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "nopea HTTP API listening");
    axum::serve(listener, router).await
}
