//! CLI entry point.
//!
//! Parses arguments, wires the coordinator through bootstrap and routes
//! each command to its handler.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use courseforge_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command.as_ref() else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    // Replay is offline and needs no context
    if let Commands::Replay { file, json } = command {
        return handlers::replay::execute(file, *json).await;
    }

    let config = CliConfig::from_cli(&cli)?;
    let ctx = bootstrap(config).await?;

    match command {
        Commands::Track { task_id, json } => handlers::track::execute(&ctx, task_id, *json).await,
        Commands::Forget { task_id } => handlers::forget::execute(&ctx, task_id).await,
        Commands::Replay { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}
