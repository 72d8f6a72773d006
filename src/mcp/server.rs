//! MCP server exposing the Fusion 360 scripting API as tools.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool calls and other requests
//! 3. **Shutdown**: End of input or a termination signal
//!
//! # Host calls
//!
//! The server runs on a tokio runtime off the main thread. Each host tool call
//! is handed to a blocking worker that calls [`Bridge::invoke`], which queues
//! the request, wakes the main thread and waits for its result. Requests are
//! read one at a time, so a slow host call delays the next request but never
//! blocks the runtime.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};

use crate::bridge::{error_message, is_error_result, Bridge, BridgeError, ERROR_FIELD};
use crate::host::Operation;
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::mcp::tools::{self, ToolRoute};
use crate::mcp::transport::Transport;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ToolCapabilities::default()),
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // skip_serializing_if passes &T
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// A tool definition for tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Base64-encoded image.
    Image {
        /// Image bytes, base64.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Creates a successful image result.
    #[must_use]
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Image {
                data: data.into(),
                mime_type: mime_type.into(),
            }],
            is_error: false,
        }
    }

    /// Converts a host operation result into tool content.
    ///
    /// Error-shaped results become error text. Screenshots become PNG image
    /// content; everything else is pretty-printed JSON.
    #[must_use]
    pub fn from_host(operation: &Operation, result: &Value) -> Self {
        if is_error_result(result) {
            return error_message(result).map_or_else(
                || Self::error(result[ERROR_FIELD].to_string()),
                Self::error,
            );
        }
        if *operation == Operation::ExportScreenshot {
            return screenshot_content(result);
        }
        serde_json::to_string_pretty(result)
            .map_or_else(|e| Self::error(format!("Failed to format result: {e}")), Self::text)
    }
}

fn screenshot_content(result: &Value) -> ToolCallResult {
    let Some(data) = result.get("data_base64").and_then(Value::as_str) else {
        return ToolCallResult::error("Screenshot failed: no image data returned");
    };
    match BASE64_STANDARD.decode(data) {
        Ok(bytes) if bytes.starts_with(PNG_SIGNATURE) => ToolCallResult::image(data, "image/png"),
        Ok(_) => ToolCallResult::error("Screenshot failed: image data is not a PNG"),
        Err(e) => ToolCallResult::error(format!("Screenshot failed: invalid base64 data: {e}")),
    }
}

/// The Fusion 360 MCP server.
pub struct McpServer<R, W> {
    /// Current server state.
    state: ServerState,
    /// The transport layer.
    transport: Transport<R, W>,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    /// Route to the main thread.
    bridge: Arc<Bridge>,
    /// How long one host call may take.
    call_timeout: Duration,
}

impl McpServer<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Creates a server on stdin/stdout.
    #[must_use]
    pub fn stdio(bridge: Arc<Bridge>, call_timeout: Duration) -> Self {
        Self::new(bridge, call_timeout, Transport::stdio())
    }
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a server that forwards host tool calls through `bridge`.
    #[must_use]
    pub const fn new(bridge: Arc<Bridge>, call_timeout: Duration, transport: Transport<R, W>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport,
            protocol_version: None,
            bridge,
            call_timeout,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Serves until end of input or SIGINT/SIGTERM (Ctrl+C on Windows).
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails or signal handlers cannot be installed.
    pub async fn run(&mut self) -> io::Result<()> {
        let result = tokio::select! {
            result = self.serve() => result,
            signal = shutdown_signal() => {
                let signal = signal?;
                tracing::info!(signal, "Received shutdown signal");
                Ok(())
            }
        };
        self.state = ServerState::ShuttingDown;
        result
    }

    /// Serves until end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn serve(&mut self) -> io::Result<()> {
        while let Some(line) = self.transport.read_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            self.handle_line(&line).await?;
            if self.state == ServerState::ShuttingDown {
                break;
            }
        }
        tracing::debug!("Input closed");
        self.state = ServerState::ShuttingDown;
        Ok(())
    }

    /// Handles a single line of input.
    async fn handle_line(&mut self, line: &str) -> io::Result<()> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => self.handle_request(req).await,
            Ok(IncomingMessage::Notification(ref notif)) => {
                self.handle_notification(notif);
                Ok(())
            }
            Err(error) => self.transport.write_error(&error).await,
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> io::Result<()> {
        tracing::debug!(id = %req.id, method = %req.method, "Request");
        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => self.handle_tools_call(&req).await,
            "ping" => Ok(JsonRpcResponse::success(req.id.clone(), json!({}))),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => self.transport.write_response(&resp).await,
            Err(error) => self.transport.write_error(&error).await,
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            tracing::info!("Client initialised");
            self.state = ServerState::Running;
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::invalid_request(
                Some(req.id.clone()),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = req.parse_params("initialize")?;
        if let Some(client) = &params.client_info {
            tracing::info!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                requested_protocol = %params.protocol_version,
                "Client connected"
            );
        }

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();
        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({
                "protocolVersion": negotiated_version,
                "capabilities": ServerCapabilities::default(),
                "serverInfo": ServerInfo::default(),
            }),
        ))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tools::definitions() }),
        ))
    }

    /// Handles the tools/call request.
    async fn handle_tools_call(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        let params: ToolCallParams = req.parse_params("tool call")?;

        let result = match tools::route(&params.name, &params.arguments) {
            Ok(ToolRoute::Health) => self.health(),
            Ok(ToolRoute::Host { operation, args }) => self.call_host(operation, args).await,
            Err(message) => ToolCallResult::error(message),
        };

        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(
                req.id.clone(),
                "Internal error: failed to serialise result",
            )
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    /// Answers the health tool from server-side state only.
    fn health(&self) -> ToolCallResult {
        let status = json!({
            "status": "ok",
            "fusion": "connected",
            "server": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "protocol_version": self.protocol_version,
            "pending_requests": self.bridge.pending_count(),
            "waiting_callers": self.bridge.waiter_count(),
        });
        ToolCallResult::text(status.to_string())
    }

    /// Runs one host operation on the main thread and waits for it.
    async fn call_host(&self, operation: Operation, args: Vec<Value>) -> ToolCallResult {
        let bridge = Arc::clone(&self.bridge);
        let timeout = self.call_timeout;
        let requested = operation.clone();

        let outcome =
            tokio::task::spawn_blocking(move || bridge.invoke(requested, args, timeout)).await;

        match outcome {
            Ok(Ok(result)) => ToolCallResult::from_host(&operation, &result),
            Ok(Err(error @ BridgeError::Timeout { .. })) => {
                tracing::warn!(%operation, error = %error, "Host call timed out");
                ToolCallResult::error(error.to_string())
            }
            Ok(Err(error)) => {
                tracing::error!(%operation, error = %error, "Host call not delivered");
                ToolCallResult::error(format!("Fusion 360 is not accepting requests: {error}"))
            }
            Err(join_error) => {
                tracing::error!(%operation, error = %join_error, "Host call worker failed");
                ToolCallResult::error(format!("Internal error: {join_error}"))
            }
        }
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::invalid_request(
                Some(id.clone()),
                "Server not initialised",
            ));
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => Ok("SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(windows)]
async fn shutdown_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::error_result;

    #[test]
    fn tool_call_result_text() {
        let result = ToolCallResult::text("Hello, world!");
        assert!(!result.is_error);
        assert_eq!(
            result.content,
            vec![ToolContent::Text {
                text: "Hello, world!".to_string()
            }]
        );
    }

    #[test]
    fn image_content_serialises_mime_type() {
        let result = ToolCallResult::image("aGk=", "image/png");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({ "content": [{ "type": "image", "data": "aGk=", "mimeType": "image/png" }] })
        );
    }

    #[test]
    fn error_shaped_host_results_become_errors() {
        let result = ToolCallResult::from_host(
            &Operation::GetDocumentInfo,
            &error_result("API call failed: No active document"),
        );
        assert!(result.is_error);
        assert_eq!(
            result.content,
            vec![ToolContent::Text {
                text: "API call failed: No active document".to_string()
            }]
        );
    }

    #[test]
    fn non_string_error_field_still_marks_an_error() {
        let result = ToolCallResult::from_host(
            &Operation::GetBodyInfo,
            &json!({ "error": { "code": 7 } }),
        );
        assert!(result.is_error);
        assert_eq!(
            result.content,
            vec![ToolContent::Text {
                text: r#"{"code":7}"#.to_string()
            }]
        );
    }

    #[test]
    fn plain_results_are_pretty_json() {
        let result =
            ToolCallResult::from_host(&Operation::GetParameters, &json!({ "count": 0 }));
        let ToolContent::Text { text } = &result.content[0] else {
            panic!("expected text");
        };
        assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!({ "count": 0 }));
    }

    #[test]
    fn screenshot_data_must_be_png() {
        let png = BASE64_STANDARD.encode(b"\x89PNG\r\n\x1a\nrest");
        let ok = ToolCallResult::from_host(
            &Operation::ExportScreenshot,
            &json!({ "format": "png", "data_base64": png }),
        );
        assert_eq!(
            ok.content,
            vec![ToolContent::Image {
                data: png,
                mime_type: "image/png".to_string()
            }]
        );

        let not_png = ToolCallResult::from_host(
            &Operation::ExportScreenshot,
            &json!({ "data_base64": BASE64_STANDARD.encode(b"GIF89a") }),
        );
        assert!(not_png.is_error);

        let garbage =
            ToolCallResult::from_host(&Operation::ExportScreenshot, &json!({ "data_base64": "%%" }));
        assert!(garbage.is_error);
    }
}
