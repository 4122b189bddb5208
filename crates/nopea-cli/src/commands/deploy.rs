//! `nopea deploy` (spec.md §6).

use super::{build_environment, print_json};
use anyhow::{Context, Result};
use clap::Args;
use nopea_core::{DeployOptions, DeploySpec, Manifest, Strategy};

#[derive(Args)]
pub struct DeployArgs {
    /// Path to a JSON file holding one manifest, an array of
    /// manifests, or `{"manifests": [...]}`. YAML decoding is an
    /// external collaborator's job, not this CLI's.
    #[arg(short = 'f', long = "file")]
    file: Option<String>,

    #[arg(short = 's', long = "service")]
    service: String,

    #[arg(short = 'n', long = "namespace")]
    namespace: Option<String>,

    #[arg(long = "strategy")]
    strategy: Option<String>,

    #[arg(long = "json")]
    json: bool,
}

fn manifests_from_file(path: &str) -> Result<Vec<Manifest>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let value: serde_json::Value = serde_json::from_str(&raw).with_context(|| format!("parsing {path} as JSON"))?;
    Ok(match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(ref map) if map.contains_key("manifests") => {
            map["manifests"].as_array().cloned().unwrap_or_default()
        }
        single => vec![single],
    })
}

pub async fn run(args: DeployArgs) -> Result<()> {
    let manifests = match &args.file {
        Some(path) => manifests_from_file(path)?,
        None => Vec::new(),
    };

    let spec = DeploySpec {
        service: args.service.clone(),
        namespace: args.namespace.unwrap_or_else(|| "default".to_string()),
        manifests,
        strategy: args.strategy.as_deref().map(Strategy::parse),
        options: DeployOptions::default(),
        timeout_ms: nopea_core::DEFAULT_TIMEOUT_MS,
    };

    let config = nopea_core::Config::from_env();
    let env = build_environment(&config);
    let result = env.agents.deploy(&args.service, spec).await;

    if args.json {
        print_json(&serde_json::to_value(&result)?);
    } else {
        println!(
            "{} deploy {} via {} strategy in {}ms (verified: {})",
            result.status, result.service, result.strategy, result.duration_ms, result.verified
        );
        if let Some(error) = &result.error {
            println!("error: {error}");
        }
    }

    if result.error.is_some() {
        anyhow::bail!("deploy failed");
    }
    Ok(())
}
