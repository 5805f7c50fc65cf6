//! MCP server for the NeuroVision dependency graph.
//!
//! This crate provides an MCP (Model Context Protocol) server that lets AI
//! coding agents ask "what breaks if I change this file?" and report runtime
//! events back onto the graph.
//!
//! # Architecture
//!
//! The server uses the `rmcp` crate for MCP protocol handling and wraps a
//! cache of `neurovision::NeuroVision` engines, one per mounted project.
//! Engine calls are blocking and run on the tokio blocking pool.
//!
//! # Tools
//!
//! ## Context Management
//! - `set_context` - Mount a project root (scanned on first use)
//! - `where_am_i` - Show the current project and graph state
//! - `refresh_vision` - Force a full rescan
//!
//! ## Graph Queries
//! - `visualize_architecture` - Snapshot of nodes, edges and annotations
//! - `analyze_impact` - Ripple set of a file, nearest first
//!
//! ## Telemetry
//! - `send_telemetry` - Attach a runtime event to a node

pub mod context;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::NeuroVisionMcpServer;
