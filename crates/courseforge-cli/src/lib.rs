#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

//! Terminal front end for the live-build synchronization engine.
//!
//! `main.rs` parses arguments, bootstraps a [`CliContext`] and dispatches
//! to a handler; everything else lives here so it can be tested.

// Used only by the binary
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliConfig, CliContext, StateLocation, bootstrap};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
