//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp.

use crate::context::Context;
use crate::error::Error;
use crate::models::{
    ImpactParams, RefreshParams, SetContextParams, TelemetryParams, VisualizeParams,
};
use crate::tools::Tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{
    handler::server::ServerHandler, tool, tool_handler, tool_router, ErrorData as McpError,
    ServiceExt,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// The NeuroVision MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct NeuroVisionMcpServer {
    /// Shared context for project management.
    context: Arc<RwLock<Context>>,
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl NeuroVisionMcpServer {
    /// Set the project context for subsequent operations.
    #[tool(
        description = "Mount a project root for all subsequent operations and scan it on first use. Call this first before using other tools."
    )]
    async fn set_context(
        &self,
        Parameters(params): Parameters<SetContextParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.tools.set_context(&params.project_root).await?;
        Ok(CallToolResult::success(vec![Content::json(response)?]))
    }

    /// Get current project context information.
    #[tool(description = "Show the current project root, graph state and node/edge counts.")]
    async fn where_am_i(&self) -> Result<CallToolResult, McpError> {
        let response = self.tools.where_am_i().await?;
        Ok(CallToolResult::success(vec![Content::json(response)?]))
    }

    /// Force a full rescan.
    #[tool(
        description = "Rescan the project after files changed outside your own edits. Unchanged files are not re-parsed."
    )]
    async fn refresh_vision(
        &self,
        Parameters(params): Parameters<RefreshParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .tools
            .refresh_vision(params.project_root.as_deref())
            .await?;
        Ok(CallToolResult::success(vec![Content::json(response)?]))
    }

    /// Snapshot of the dependency graph.
    #[tool(
        description = "Get the project's dependency graph: files, external modules, import edges and recent runtime annotations per node."
    )]
    async fn visualize_architecture(
        &self,
        Parameters(params): Parameters<VisualizeParams>,
    ) -> Result<CallToolResult, McpError> {
        let view = self.tools.visualize_architecture(params).await?;
        Ok(CallToolResult::success(vec![Content::json(view)?]))
    }

    /// Ripple set of a file.
    #[tool(
        description = "List every file that directly or transitively depends on the target, nearest first, with confidence and a risk score. Returns status not_found for unknown targets."
    )]
    async fn analyze_impact(
        &self,
        Parameters(params): Parameters<ImpactParams>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.tools.analyze_impact(params).await?;
        Ok(CallToolResult::success(vec![Content::json(outcome)?]))
    }

    /// Attach a runtime event to a node.
    #[tool(
        description = "Report a runtime event (log line, error, execution) for a file. Unknown files get a placeholder node until they are scanned."
    )]
    async fn send_telemetry(
        &self,
        Parameters(params): Parameters<TelemetryParams>,
    ) -> Result<CallToolResult, McpError> {
        let ack = self.tools.send_telemetry(params).await?;
        Ok(CallToolResult::success(vec![Content::json(ack)?]))
    }
}

impl NeuroVisionMcpServer {
    /// Create a new NeuroVision MCP server.
    #[must_use]
    pub fn new() -> Self {
        let context = Arc::new(RwLock::new(Context::new()));
        let tools = Arc::new(Tools::new(Arc::clone(&context)));

        Self {
            context,
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the context.
    #[must_use]
    pub fn context(&self) -> &Arc<RwLock<Context>> {
        &self.context
    }

    /// Serve MCP over stdio until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns `Error::Mcp` if the protocol handshake fails.
    pub async fn run(self) -> crate::Result<()> {
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| Error::Mcp(e.to_string()))?;
        info!("MCP server ready on stdio");

        let reason = service.waiting().await?;
        info!(?reason, "MCP server stopped");
        Ok(())
    }
}

impl Default for NeuroVisionMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for NeuroVisionMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "neurovision-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "NeuroVision dependency graph server. Call set_context with the project root first, then analyze_impact before editing a file."
                    .into(),
            ),
        }
    }
}
