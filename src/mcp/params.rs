//! MCP tool parameter types.
//!
//! Defines the input schemas for MCP tools using `schemars` for automatic
//! JSON Schema generation required by the MCP protocol.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `ask` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// The question to answer from the document corpus.
    pub question: String,

    /// Conversation to continue. Follow-up questions in the same session
    /// are resolved against earlier turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Forget the session's earlier turns before answering.
    #[serde(default)]
    pub clear_history: bool,

    /// Retrieval strategy override: `"direct"`, `"rewrite"`, `"decompose"`,
    /// or `"hyde"`. Absent means the classifier decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// Parameters for the `clear_history` MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClearHistoryParams {
    /// Conversation to forget.
    pub session_id: String,
}
