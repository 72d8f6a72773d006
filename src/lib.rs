//! fusion360-mcp: MCP server for the Fusion 360 scripting API
//!
//! The host application's API may only be called from its main thread, while
//! MCP requests arrive on a worker thread. A [`bridge::Bridge`] hands each call
//! to the main thread and blocks the caller until the result comes back.
//!
//! # Architecture
//!
//! - **Bridge**: request queue, per-request waiters, main-thread wake signal
//! - **Host**: typed operations and a capability table dispatching onto a
//!   [`host::HostApi`], with an in-memory design for running without Fusion 360
//! - **MCP**: stdio JSON-RPC server turning tool calls into bridge requests
//!
//! # Modules
//!
//! - [`bridge`] — Main-thread request marshaling
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Configuration error types
//! - [`host`] — Host API surface and simulated host
//! - [`mcp`] — MCP protocol implementation

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod mcp;
