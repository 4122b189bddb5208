//! `nopea serve` (spec.md §6): starts the HTTP API and runs
//! indefinitely.

use super::build_environment;
use anyhow::Result;
use clap::Args;
use nopea_server::AppState;

#[derive(Args)]
pub struct ServeArgs {
    /// HTTP listener port. Overrides `API_PORT` (spec.md §6 `api_port`)
    /// when given; otherwise the port comes from the process config.
    #[arg(long = "port")]
    port: Option<u16>,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let config = nopea_core::Config::from_env();
    let port = args.port.unwrap_or(config.api_port);
    let env = build_environment(&config);
    let state = AppState::new(env.agents, Some(env.memory), env.cache);
    nopea_server::serve_http(state, port).await?;
    Ok(())
}
