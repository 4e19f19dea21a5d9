//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// adaptive-rag: conversational question answering over a private corpus.
///
/// Each question is classified and retrieved with the cheapest strategy
/// that fits it: a direct search, a rewritten search, or a decomposition
/// into concurrently searched sub-questions.
#[derive(Parser, Debug)]
#[command(name = "adaptive-rag")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose (debug) logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Where documents come from and how prompts are loaded.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// JSON corpus file loaded into the in-process index.
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Base URL of an external vector store service.
    #[arg(long, conflicts_with = "corpus")]
    pub vector_store_url: Option<String>,

    /// Directory containing prompt template files.
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,

    /// Documents passed to the answer step.
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Search mode requested from the store (similarity, mmr).
    #[arg(long)]
    pub search_mode: Option<String>,

    /// Keep only the query-relevant passages of each retrieved document.
    #[arg(long)]
    pub compress: bool,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API.
    ///
    /// Endpoints: `POST /query`, `GET /health`, `DELETE /sessions/{id}`.
    /// Stops gracefully on Ctrl-C.
    #[command(after_help = r#"Examples:
  adaptive-rag serve --corpus docs.json                 # Listen on 127.0.0.1:8000
  adaptive-rag serve --corpus docs.json --addr 0.0.0.0:9000
  adaptive-rag serve --vector-store-url http://localhost:7700
  curl -s localhost:8000/query -d '{"question":"What is X?"}' -H 'content-type: application/json'
"#)]
    Serve {
        /// Address to bind to.
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Answer one question and exit.
    #[command(after_help = r#"Examples:
  adaptive-rag ask "What is the retry policy of service B?" --corpus docs.json
  adaptive-rag ask "Compare A and B on latency and cost" --corpus docs.json
  adaptive-rag ask "Explain the outage" --strategy hyde --corpus docs.json
  adaptive-rag ask "What is X?" --corpus docs.json --compress
  adaptive-rag --format json ask "What is X?" --corpus docs.json | jq '.retrieval.metadata'
"#)]
    Ask {
        /// The question to answer.
        question: String,

        /// Force a strategy instead of classifying (direct, rewrite, decompose, hyde).
        #[arg(short, long)]
        strategy: Option<String>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// List the retrieval strategies.
    Strategies,

    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched.
    #[command(after_help = r#"Examples:
  adaptive-rag init-prompts                      # ~/.config/adaptive-rag/prompts
  adaptive-rag init-prompts --dir ./prompts
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Serve the MCP (Model Context Protocol) tools over stdio.
    #[cfg(feature = "mcp")]
    #[command(after_help = r#"Examples:
  adaptive-rag mcp --corpus docs.json
  OPENAI_API_KEY=sk-... adaptive-rag mcp --vector-store-url http://localhost:7700
"#)]
    Mcp {
        #[command(flatten)]
        source: SourceArgs,
    },
}
