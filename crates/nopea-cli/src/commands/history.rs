//! `nopea history` (spec.md §6).

use super::{build_environment, print_json};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct HistoryArgs {
    service: String,

    #[arg(long = "json")]
    json: bool,
}

pub async fn run(args: HistoryArgs) -> Result<()> {
    let config = nopea_core::Config::from_env();
    let env = build_environment(&config);
    let deployments = env.cache.list_deployments(&args.service);

    if args.json {
        print_json(&serde_json::json!({"service": args.service, "deployments": deployments}));
    } else if deployments.is_empty() {
        println!("{}: no deploys recorded", args.service);
    } else {
        for deploy in &deployments {
            println!("{} {} {} ({}ms, verified: {})", deploy.timestamp, deploy.deploy_id, deploy.status, deploy.duration_ms, deploy.verified);
        }
    }
    Ok(())
}
