//! Available subcommands.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow a running build until it completes or fails
    Track {
        /// Task id returned when the build was started
        task_id: String,
        /// Print each snapshot as one JSON line instead of a progress view
        #[arg(long)]
        json: bool,
    },

    /// Fold a recorded event log (one JSON message per line) into a snapshot
    Replay {
        /// Path to the `.jsonl` log
        file: PathBuf,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Discard cached progress for a task
    Forget {
        /// Task id whose cached progress should be removed
        task_id: String,
    },
}
