//! The MCP tool-discovery and execution sub-engine: registers
//! external tool clients and in-process handlers, computes the effective
//! filtered tool set for a chat-shaped request, and dispatches tool calls.
//!
//! This crate is the sole implementor of `bifrost_core::McpAugmenter`; the
//! dispatcher depends on that trait, never on this crate directly, so a
//! caller can swap in a different MCP engine (or none, per
//! `GlobalConfig::mcp_enabled`) without touching `bifrost-core`.

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod manager;
pub mod protocol;
pub mod transport;

pub use catalog::{CandidateTool, LocalTool, LocalToolHandler};
pub use client::McpClient;
pub use config::{ClientConfig, ConnectionKind};
pub use error::{McpError, McpResult};
pub use manager::McpManager;
