//! MCP client over Streamable HTTP — JSON-RPC 2.0 requests POSTed to a
//! single endpoint, with responses arriving either as plain JSON or wrapped
//! in a short SSE stream.

use crate::protocol::{InitializeResult, JsonRpcRequest, JsonRpcResponse, ToolCallResult};
use crate::transport::ToolTransport;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tooltalk_core::{CallArgs, ToolDescriptor, TooltalkError, TooltalkResult};
use tracing::{debug, info};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// HTTP implementation of [`ToolTransport`].
///
/// Serves one server at a time; a second `connect` drops the previous
/// session. The server-assigned `Mcp-Session-Id` is echoed on every request
/// once the server hands one out.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Option<String>,
    token: Option<String>,
    session_id: Option<String>,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Create a disconnected transport.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: None,
            token: None,
            session_id: None,
            next_id: AtomicU64::new(1),
        }
    }

    fn endpoint(&self) -> TooltalkResult<&str> {
        self.endpoint.as_deref().ok_or(TooltalkError::NotConnected)
    }

    fn reset(&mut self) {
        self.endpoint = None;
        self.token = None;
        self.session_id = None;
    }

    fn capture_session(&mut self, headers: &HeaderMap) {
        if let Some(session) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
            if self.session_id.as_deref() != Some(session) {
                debug!(session = %session, "Server assigned MCP session id");
                self.session_id = Some(session.to_string());
            }
        }
    }

    /// POST a JSON body to the endpoint with the headers the protocol wants.
    async fn post_json(&self, body: Value) -> TooltalkResult<reqwest::Response> {
        let url = self.endpoint()?;
        // No request timeout: a hung transport call hangs the command that
        // issued it.
        let mut req = self
            .http
            .post(url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(session) = &self.session_id {
            req = req.header(SESSION_HEADER, session);
        }

        let response = req
            .send()
            .await
            .map_err(|e| TooltalkError::Transport(format!("HTTP request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(TooltalkError::Transport(format!(
                "server returned HTTP {}",
                response.status()
            )));
        }
        Ok(response)
    }

    /// Send a JSON-RPC request and decode the matching response.
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> TooltalkResult<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);
        debug!(method = %method, id, "Sending MCP request");

        let response = self.post_json(serde_json::to_value(&req)?).await?;
        self.capture_session(response.headers());

        let resp = decode_response(response, id).await?;
        if let Some(err) = &resp.error {
            return Err(TooltalkError::Transport(format!(
                "MCP error {}: {}",
                err.code, err.message
            )));
        }
        Ok(resp)
    }

    /// Send a JSON-RPC notification (no id, no response body expected).
    async fn notify(&self, method: &str) -> TooltalkResult<()> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": {},
        });
        self.post_json(body).await?;
        Ok(())
    }

    async fn initialize(&mut self) -> TooltalkResult<InitializeResult> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "tooltalk",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let resp = self.request("initialize", Some(params)).await?;
        let result: InitializeResult = serde_json::from_value(
            resp.result
                .ok_or_else(|| TooltalkError::Transport("Empty initialize result".into()))?,
        )
        .map_err(|e| {
            TooltalkError::Transport(format!("Failed to parse initialize result: {e}"))
        })?;

        Ok(result)
    }

    async fn handshake(&mut self, url: &str) -> TooltalkResult<Vec<ToolDescriptor>> {
        let init = self.initialize().await?;
        info!(
            url = %url,
            version = %init.protocol_version,
            "MCP server initialized"
        );

        self.notify("notifications/initialized").await?;

        let tools = self.fetch_tools().await?;
        info!(url = %url, tools = tools.len(), "MCP tools discovered");
        Ok(tools)
    }

    async fn fetch_tools(&mut self) -> TooltalkResult<Vec<ToolDescriptor>> {
        let resp = self.request("tools/list", None).await?;
        let result = resp
            .result
            .ok_or_else(|| TooltalkError::Transport("Empty tools/list result".into()))?;

        let tools: Vec<ToolDescriptor> = serde_json::from_value(
            result
                .get("tools")
                .cloned()
                .unwrap_or(serde_json::json!([])),
        )
        .map_err(|e| TooltalkError::Transport(format!("Failed to parse tools: {e}")))?;

        Ok(tools)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTransport for HttpTransport {
    async fn connect(
        &mut self,
        url: &str,
        token: Option<&str>,
    ) -> TooltalkResult<Vec<ToolDescriptor>> {
        self.endpoint = Some(url.to_string());
        self.token = token.map(str::to_string);
        self.session_id = None;
        self.next_id.store(1, Ordering::SeqCst);

        let outcome = self.handshake(url).await;
        if outcome.is_err() {
            self.reset();
        }
        outcome
    }

    async fn disconnect(&mut self) -> TooltalkResult<()> {
        // Explicit session termination is optional for servers, so a refusal
        // only gets logged.
        if let (Some(url), Some(session)) = (self.endpoint.take(), self.session_id.take()) {
            let mut req = self.http.delete(&url).header(SESSION_HEADER, &session);
            if let Some(token) = &self.token {
                req = req.bearer_auth(token);
            }
            match req.send().await {
                Ok(resp) => debug!(url = %url, status = %resp.status(), "MCP session terminated"),
                Err(e) => debug!(url = %url, error = %e, "MCP session termination skipped"),
            }
        }
        self.reset();
        Ok(())
    }

    async fn list_tools(&mut self) -> TooltalkResult<Vec<ToolDescriptor>> {
        self.fetch_tools().await
    }

    async fn call_tool(&mut self, name: &str, arguments: CallArgs) -> TooltalkResult<Value> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let resp = self.request("tools/call", Some(params)).await?;
        let result = resp
            .result
            .ok_or_else(|| TooltalkError::Transport("Empty tools/call result".into()))?;

        // isError marks a tool-level failure inside an otherwise successful
        // JSON-RPC response.
        if let Ok(outcome) = ToolCallResult::deserialize(&result) {
            if outcome.is_error {
                let text = outcome.text();
                let message = if text.is_empty() {
                    "tool reported an error".to_string()
                } else {
                    text
                };
                return Err(TooltalkError::Transport(message));
            }
        }

        Ok(result)
    }
}

/// Decode a JSON-RPC response body, unwrapping SSE framing when the server
/// streams it.
async fn decode_response(response: reqwest::Response, id: u64) -> TooltalkResult<JsonRpcResponse> {
    let event_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"));

    if event_stream {
        let body = response
            .text()
            .await
            .map_err(|e| TooltalkError::Transport(format!("Failed to read response body: {e}")))?;
        response_from_sse(&body, id)
            .ok_or_else(|| TooltalkError::Transport("no JSON-RPC response in event stream".into()))
    } else {
        response
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| TooltalkError::Transport(format!("Failed to parse response: {e}")))
    }
}

/// Pick the JSON-RPC response for request `id` out of an SSE body.
///
/// Servers send one complete JSON-RPC message per `data:` line; anything
/// else on the stream (pings, server notifications) is skipped. A response
/// carrying a different or null id is kept as a fallback so that id-less
/// error replies still surface.
fn response_from_sse(body: &str, id: u64) -> Option<JsonRpcResponse> {
    let mut fallback = None;
    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        match serde_json::from_str::<JsonRpcResponse>(data.trim()) {
            Ok(resp) if resp.id == Some(id) => return Some(resp),
            Ok(resp) if resp.result.is_some() || resp.error.is_some() => {
                if fallback.is_none() {
                    fallback = Some(resp);
                }
            }
            _ => {}
        }
    }
    fallback
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // --- SSE unwrapping ---

    #[test]
    fn test_sse_picks_response_with_matching_id() {
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"wrong\":true}}\n",
            "\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"right\":true}}\n",
            "\n",
        );
        let resp = response_from_sse(body, 3).unwrap();
        assert_eq!(resp.id, Some(3));
        assert_eq!(resp.result.unwrap()["right"], true);
    }

    #[test]
    fn test_sse_skips_notifications_and_junk() {
        let body = concat!(
            ": keep-alive\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\n",
            "data: not json at all\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n",
        );
        let resp = response_from_sse(body, 1).unwrap();
        assert_eq!(resp.result.unwrap()["ok"], true);
    }

    #[test]
    fn test_sse_falls_back_to_null_id_error() {
        let body =
            "data: {\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32700,\"message\":\"Parse error\"}}\n";
        let resp = response_from_sse(body, 5).unwrap();
        assert_eq!(resp.id, None);
        assert_eq!(resp.error.unwrap().code, -32700);
    }

    #[test]
    fn test_sse_empty_body_yields_nothing() {
        assert!(response_from_sse("", 1).is_none());
        assert!(response_from_sse("event: message\n\n", 1).is_none());
    }

    // --- Session header capture ---

    #[test]
    fn test_capture_session_reads_header_case_insensitively() {
        let mut transport = HttpTransport::new();
        let mut headers = HeaderMap::new();
        headers.insert("mcp-session-id", "abc-123".parse().unwrap());
        transport.capture_session(&headers);
        assert_eq!(transport.session_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_capture_session_keeps_existing_when_absent() {
        let mut transport = HttpTransport::new();
        transport.session_id = Some("kept".to_string());
        transport.capture_session(&HeaderMap::new());
        assert_eq!(transport.session_id.as_deref(), Some("kept"));
    }

    // --- Connection state ---

    #[test]
    fn test_endpoint_requires_connection() {
        let transport = HttpTransport::new();
        assert!(matches!(
            transport.endpoint(),
            Err(TooltalkError::NotConnected)
        ));
    }
}
