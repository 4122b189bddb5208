//! `nopea context` (spec.md §6).

use super::{build_environment, print_json};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct ContextArgs {
    service: String,

    #[arg(short = 'n', long = "namespace")]
    namespace: Option<String>,

    #[arg(long = "json")]
    json: bool,
}

pub async fn run(args: ContextArgs) -> Result<()> {
    let config = nopea_core::Config::from_env();
    let env = build_environment(&config);
    let namespace = args.namespace.unwrap_or_else(|| "default".to_string());
    let context = env.memory.get_deploy_context(&args.service, &namespace).await;

    if args.json {
        print_json(&serde_json::to_value(&context)?);
    } else if !context.known {
        println!("{} in {}: no history yet", context.service, context.namespace);
    } else {
        println!("{} in {}:", context.service, context.namespace);
        for pattern in &context.failure_patterns {
            println!("  fails with {} (confidence {:.2}, {} observations)", pattern.error, pattern.confidence, pattern.observations);
        }
        for dependency in &context.dependencies {
            println!("  depends on {} (weight {:.2})", dependency.target_name, dependency.weight);
        }
        for recommendation in &context.recommendations {
            println!("  recommendation: {recommendation}");
        }
    }
    Ok(())
}
