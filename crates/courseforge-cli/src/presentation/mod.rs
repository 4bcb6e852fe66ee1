//! Shared CLI presentation utilities.
//!
//! # Guidelines
//!
//! - Keep this module format-only: no domain transforms
//! - Rendering returns strings; handlers decide where they go

pub mod snapshot_view;

pub use snapshot_view::{progress_bar, render_outcome, render_snapshot, status_marker};
