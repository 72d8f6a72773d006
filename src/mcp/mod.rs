//! Model Context Protocol (MCP) server implementation.
//!
//! Exposes the Fusion 360 scripting API as MCP tools. The server speaks
//! JSON-RPC 2.0 over newline-delimited stdio and forwards host tool calls to
//! the main thread through the [`Bridge`](crate::bridge::Bridge).
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────── MCP thread ──────────────────────────┐
//! │                                                                │
//! │   ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐   │
//! │   │  Transport  │───▶│   Server    │───▶│  Tools (routing) │   │
//! │   │   (stdio)   │    │ (lifecycle) │    │                  │   │
//! │   └─────────────┘    └─────────────┘    └────────┬─────────┘   │
//! │                                                  │ invoke      │
//! └──────────────────────────────────────────────────┼─────────────┘
//!                                                    ▼
//!                                    Bridge ──▶ main thread drain
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::{McpServer, ToolCallResult, ToolContent};
pub use transport::{StdioTransport, Transport};
