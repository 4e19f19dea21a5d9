//! MCP transport layer.

use rmcp::ServiceExt;
use rmcp::transport::io::stdio;

use super::server::RagMcpServer;

/// Starts the MCP server with stdio transport.
///
/// The server reads JSON-RPC messages from stdin and writes responses to
/// stdout, so logging must stay on stderr while it runs.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters a runtime error.
pub async fn serve_stdio(server: RagMcpServer) -> anyhow::Result<()> {
    tracing::info!("MCP server listening on stdio");
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
