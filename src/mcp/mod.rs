//! MCP (Model Context Protocol) server for adaptive-rag.
//!
//! Exposes the question-answering pipeline as MCP tools so that external
//! agents can ask questions against the corpus.
//!
//! # Feature Gate
//!
//! This module requires the `mcp` feature flag:
//! ```toml
//! [dependencies]
//! adaptive-rag = { version = "...", features = ["mcp"] }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP Client
//!   ↓ ask(question, session_id)
//! RagMcpServer
//!   ↓
//! RagPipeline::answer()
//!   ├── Contextualizer
//!   ├── Orchestrator (classify → transform → search → merge)
//!   └── Synthesizer
//!   ↓
//! Answer JSON → MCP Client
//! ```

pub mod params;
pub mod server;
pub mod transport;

pub use params::{AskParams, ClearHistoryParams};
pub use server::RagMcpServer;
pub use transport::serve_stdio;
