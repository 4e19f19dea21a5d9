//! MCP server implementation for adaptive-rag.
//!
//! Exposes the question-answering pipeline as MCP tools.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};

use crate::agent::pipeline::{AskOptions, RagPipeline};
use crate::core::Strategy;
use crate::error::{CommandError, Error};

use super::params::{AskParams, ClearHistoryParams};

/// Session used when a tool call does not name one.
const DEFAULT_SESSION: &str = "mcp";

/// adaptive-rag MCP server.
#[derive(Clone)]
pub struct RagMcpServer {
    tool_router: ToolRouter<Self>,
    pipeline: Arc<RagPipeline>,
}

impl RagMcpServer {
    /// Creates a server backed by `pipeline`.
    #[must_use]
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            pipeline,
        }
    }
}

#[tool_router]
impl RagMcpServer {
    /// Answer a question from the corpus with adaptive retrieval.
    #[tool(
        name = "ask",
        description = "Answer a question from the private document corpus. Follow-up questions are resolved against earlier turns of the same session. The retrieval strategy (direct search, query rewrite, or decomposition into sub-questions) is chosen per question unless overridden. Returns JSON with the answer, the retrieved documents, and retrieval metadata."
    )]
    async fn ask(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        let strategy = params
            .strategy
            .as_deref()
            .map(|s| {
                Strategy::parse(s)
                    .ok_or_else(|| McpError::invalid_params(format!("Unknown strategy: {s}"), None))
            })
            .transpose()?;
        let session_id = params
            .session_id
            .unwrap_or_else(|| DEFAULT_SESSION.to_string());

        let answer = self
            .pipeline
            .answer(
                &session_id,
                &params.question,
                AskOptions {
                    clear_history: params.clear_history,
                    strategy,
                },
            )
            .await
            .map_err(|e| match e {
                Error::Command(CommandError::InvalidInput(message)) => {
                    McpError::invalid_params(message, None)
                }
                Error::Synthesis(e) => McpError::internal_error(e.user_message(), None),
                other => McpError::internal_error(format!("Pipeline failed: {other}"), None),
            })?;

        let json = serde_json::to_string_pretty(&answer)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    /// Forget a conversation.
    #[tool(
        name = "clear_history",
        description = "Forget the conversation history of a session so that the next question starts fresh."
    )]
    async fn clear_history(
        &self,
        Parameters(params): Parameters<ClearHistoryParams>,
    ) -> Result<CallToolResult, McpError> {
        self.pipeline
            .clear_history(&params.session_id)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Cleared history for session {}",
            params.session_id
        ))]))
    }
}

#[tool_handler]
impl ServerHandler for RagMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "adaptive-rag".to_string(),
                title: Some("adaptive-rag MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "adaptive-rag: question answering over a private document corpus. Use the \
                 `ask` tool with a session_id to hold a conversation, and `clear_history` \
                 to start over."
                    .to_string(),
            ),
        }
    }
}
