//! CLI bootstrap - the composition root.
//!
//! The only place where concrete transports and storage are chosen:
//! - HTTP push and pull adapters (via courseforge-sync)
//! - File-backed or in-memory snapshot storage
//!
//! Handlers receive the composed [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use courseforge_core::{KeyValueStore, MemoryKeyValueStore, SnapshotStore};
use courseforge_sync::{FileKeyValueStore, ProgressCoordinator, SyncConfig};
use tracing::{debug, warn};

use crate::error::CliError;
use crate::parser::Cli;

const STATE_DIR_NAME: &str = "courseforge";

/// Where cached progress lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLocation {
    Directory(PathBuf),
    Memory,
}

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub sync: SyncConfig,
    pub state: StateLocation,
}

impl CliConfig {
    /// Resolve configuration from parsed arguments (and their env fallbacks).
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut sync = SyncConfig::new().with_optional_token(cli.token.clone());
        if let Some(base_url) = &cli.base_url {
            sync = sync.with_base_url(base_url.clone());
        }
        if let Some(secs) = cli.poll_interval_secs {
            if secs == 0 {
                return Err(CliError::Arguments(
                    "poll interval must be at least one second".to_string(),
                ));
            }
            sync = sync.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = cli.reconnect_delay_secs {
            sync = sync.with_reconnect_delay(Duration::from_secs(secs));
        }

        let state = if cli.ephemeral {
            StateLocation::Memory
        } else {
            match &cli.state_dir {
                Some(dir) => StateLocation::Directory(dir.clone()),
                None => StateLocation::Directory(default_state_dir()?),
            }
        };

        Ok(Self { sync, state })
    }
}

fn default_state_dir() -> Result<PathBuf, CliError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(STATE_DIR_NAME).join("state"))
        .ok_or_else(|| {
            CliError::Config(
                "no data directory available; pass --state-dir or --ephemeral".to_string(),
            )
        })
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub coordinator: ProgressCoordinator,
    pub store: SnapshotStore,
}

/// Compose the coordinator and its storage.
///
/// An unusable state directory is not fatal: progress is then cached in
/// memory for this run only.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let backend: Arc<dyn KeyValueStore> = match &config.state {
        StateLocation::Memory => Arc::new(MemoryKeyValueStore::new()),
        StateLocation::Directory(dir) => match FileKeyValueStore::open(dir.clone()).await {
            Ok(store) => {
                debug!(path = %dir.display(), "Using file-backed progress cache");
                Arc::new(store)
            }
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "State directory unusable, caching in memory only");
                Arc::new(MemoryKeyValueStore::new())
            }
        },
    };

    let store = SnapshotStore::new(backend);
    let coordinator =
        ProgressCoordinator::with_http(&config.sync, store.clone()).map_err(CliError::from)?;

    Ok(CliContext { coordinator, store })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn explicit_state_dir_wins() {
        let cli = Cli::parse_from(["courseforge", "--state-dir", "/tmp/cf", "forget", "t1"]);
        let config = CliConfig::from_cli(&cli).unwrap();
        assert_eq!(
            config.state,
            StateLocation::Directory(PathBuf::from("/tmp/cf"))
        );
    }

    #[test]
    fn ephemeral_uses_memory() {
        let cli = Cli::parse_from(["courseforge", "--ephemeral", "forget", "t1"]);
        assert_eq!(
            CliConfig::from_cli(&cli).unwrap().state,
            StateLocation::Memory
        );
    }

    #[test]
    fn timing_flags_reach_sync_config() {
        let cli = Cli::parse_from([
            "courseforge",
            "--ephemeral",
            "--poll-interval-secs",
            "7",
            "--reconnect-delay-secs",
            "1",
            "forget",
            "t1",
        ]);
        let config = CliConfig::from_cli(&cli).unwrap();
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(7));
        assert_eq!(config.sync.reconnect_delay(), Duration::from_secs(1));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cli = Cli::parse_from([
            "courseforge",
            "--ephemeral",
            "--poll-interval-secs",
            "0",
            "forget",
            "t1",
        ]);
        assert!(matches!(
            CliConfig::from_cli(&cli),
            Err(CliError::Arguments(_))
        ));
    }

    #[tokio::test]
    async fn bootstrap_creates_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("nested").join("state");
        let config = CliConfig {
            sync: SyncConfig::new(),
            state: StateLocation::Directory(state.clone()),
        };

        bootstrap(config).await.unwrap();
        assert!(state.is_dir());
    }

    #[tokio::test]
    async fn bootstrap_rejects_bad_base_url() {
        let config = CliConfig {
            sync: SyncConfig::new().with_base_url("not a url"),
            state: StateLocation::Memory,
        };
        assert!(bootstrap(config).await.is_err());
    }
}
