//! CLI layer for adaptive-rag.
//!
//! Provides the command-line interface using clap, with commands for
//! serving the HTTP API, answering one-off questions, listing strategies,
//! and scaffolding prompt templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, SourceArgs};
