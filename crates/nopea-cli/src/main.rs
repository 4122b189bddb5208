//! Unified command-line entry point (spec.md §6). Exits 0 on success,
//! 1 on error.

mod commands;

use clap::{Parser, Subcommand};
use commands::{context, deploy, history, memory, serve, status};

#[derive(Parser)]
#[command(name = "nopea")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Kubernetes deploy orchestrator that learns from deploy history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a service's manifests
    Deploy(deploy::DeployArgs),
    /// Show a running agent's status for a service
    Status(status::StatusArgs),
    /// Fetch a service's deploy history context
    Context(context::ContextArgs),
    /// List a service's past deploys
    History(history::HistoryArgs),
    /// Report the state of the memory graph
    Memory(memory::MemoryArgs),
    /// Start the HTTP API and stay running
    Serve(serve::ServeArgs),
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Deploy(args) => deploy::run(args).await,
        Commands::Status(args) => status::run(args).await,
        Commands::Context(args) => context::run(args).await,
        Commands::History(args) => history::run(args).await,
        Commands::Memory(args) => memory::run(args).await,
        Commands::Serve(args) => serve::run(args).await,
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn clap_parses_known_subcommands() {
        let cli = Cli::try_parse_from(["nopea", "status", "api-gw"]).expect("parse status");
        assert!(matches!(cli.command, Commands::Status(_)));

        let cli = Cli::try_parse_from(["nopea", "deploy", "-s", "api-gw"]).expect("parse deploy");
        assert!(matches!(cli.command, Commands::Deploy(_)));
    }

    #[test]
    fn clap_enforces_required_args() {
        assert!(Cli::try_parse_from(["nopea", "status"]).is_err());
        assert!(Cli::try_parse_from(["nopea", "history"]).is_err());
    }

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }
}
