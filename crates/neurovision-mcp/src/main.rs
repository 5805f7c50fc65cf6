//! NeuroVision MCP server binary.
//!
//! This binary runs the MCP server using stdio transport.

use neurovision_mcp::NeuroVisionMcpServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting neurovision-mcp server");

    let server = NeuroVisionMcpServer::new();
    server.run().await?;

    Ok(())
}
