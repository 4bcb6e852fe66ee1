//! Main CLI parser and top-level argument handling.
//!
//! Global options configure the transports and the state directory; each
//! can also come from the environment (or a `.env` file).

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Follow live course builds from the terminal.
#[derive(Parser, Debug)]
#[command(name = "courseforge")]
#[command(about = "Follow live course builds and inspect their progress")]
#[command(version)]
pub struct Cli {
    /// Base URL of the course-generation API
    #[arg(long, env = "COURSEFORGE_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Directory for cached progress (defaults to the platform data dir)
    #[arg(long, env = "COURSEFORGE_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Keep cached progress in memory only
    #[arg(long, global = true, conflicts_with = "state_dir")]
    pub ephemeral: bool,

    /// Bearer token for the API
    #[arg(long, env = "COURSEFORGE_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Seconds between status polls once the push channel is gone
    #[arg(long, env = "COURSEFORGE_POLL_INTERVAL_SECS", global = true)]
    pub poll_interval_secs: Option<u64>,

    /// Seconds to wait before reconnecting a dropped push channel
    #[arg(long, env = "COURSEFORGE_RECONNECT_DELAY_SECS", global = true)]
    pub reconnect_delay_secs: Option<u64>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "courseforge",
            "--base-url",
            "https://example.com/api",
            "--poll-interval-secs",
            "5",
            "track",
            "task-1",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.base_url.as_deref(), Some("https://example.com/api"));
        assert_eq!(cli.poll_interval_secs, Some(5));
        assert!(matches!(cli.command, Some(Commands::Track { .. })));
    }

    #[test]
    fn test_ephemeral_conflicts_with_state_dir() {
        let result = Cli::try_parse_from([
            "courseforge",
            "--ephemeral",
            "--state-dir",
            "/tmp/x",
            "forget",
            "t1",
        ]);
        assert!(result.is_err());
    }
}
