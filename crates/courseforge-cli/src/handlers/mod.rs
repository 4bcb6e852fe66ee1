//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Validate CLI input, call the coordinator, format output for the terminal
//!
//! `replay` is the exception: it works offline and takes no context.

pub mod forget;
pub mod replay;
pub mod track;
