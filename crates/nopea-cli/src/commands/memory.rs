//! `nopea memory` (spec.md §6): reports the size of the knowledge graph.

use super::{build_environment, print_json};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct MemoryArgs {
    #[arg(long = "json")]
    json: bool,
}

pub async fn run(args: MemoryArgs) -> Result<()> {
    let config = nopea_core::Config::from_env();
    let env = build_environment(&config);
    let nodes = env.memory.node_count().await;
    let relationships = env.memory.relationship_count().await;

    if args.json {
        print_json(&serde_json::json!({"nodes": nodes, "relationships": relationships}));
    } else {
        println!("graph: {nodes} nodes, {relationships} relationships");
    }
    Ok(())
}
