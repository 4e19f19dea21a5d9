//! Tracing initialization.
//!
//! Events go to stderr; stdout carries command output and the MCP stdio
//! transport.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "ADAPTIVE_RAG_LOG";

/// Initializes the global subscriber.
///
/// Reads [`LOG_ENV`] (e.g. `ADAPTIVE_RAG_LOG=adaptive_rag::agent=debug`).
/// Without it the level is `info`, or `debug` when `verbose` is set.
/// Calling this more than once has no effect.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose {
            "adaptive_rag=debug"
        } else {
            "adaptive_rag=info"
        };
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

        // try_init: a subscriber installed by an embedding application wins
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init();
    });
}
