//! `nopea status` (spec.md §6).

use super::{build_environment, print_json};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct StatusArgs {
    service: String,

    #[arg(long = "json")]
    json: bool,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let config = nopea_core::Config::from_env();
    let env = build_environment(&config);
    let report = env.agents.status(&args.service).await;

    match report {
        Some(report) if args.json => print_json(&serde_json::json!({
            "service": report.service,
            "status": report.status,
            "deploy_count": report.deploy_count,
            "queue_length": report.queue_length,
            "last_result": report.last_result,
        })),
        Some(report) => {
            println!("{}: {:?} ({} deploys, {} queued)", report.service, report.status, report.deploy_count, report.queue_length);
        }
        None => {
            if args.json {
                print_json(&serde_json::json!({"error": "not_found"}));
            } else {
                println!("{}: no agent running (never deployed, or idle-expired)", args.service);
            }
            anyhow::bail!("not_found");
        }
    }
    Ok(())
}
