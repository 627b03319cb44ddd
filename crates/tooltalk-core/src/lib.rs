//! Core types and error definitions for the tooltalk MCP chat agent.
//!
//! This crate provides the foundational types shared across all tooltalk
//! crates: the unified error enum, the tool descriptor and normalized schema
//! types the transport and orchestration layers exchange, and the small
//! outcome structs the formatter renders into chat text.
//!
//! # Main types
//!
//! - [`TooltalkError`] — Unified error enum for all tooltalk subsystems.
//! - [`TooltalkResult`] — Convenience alias for `Result<T, TooltalkError>`.
//! - [`ToolDescriptor`] — A named remote tool as reported by the server.
//! - [`ToolSchema`] — Canonical `{properties, required}` parameter schema.
//! - [`CallArgs`] — Argument mapping passed to a tool invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Error types ---

/// Top-level error type for the tooltalk agent.
///
/// Each variant corresponds to a failure mode that the chat layer renders as
/// a readable message; nothing here is allowed to escape the agent's
/// `process_message` boundary.
#[derive(Debug, thiserror::Error)]
pub enum TooltalkError {
    /// A transport connect failure, including token resolution problems.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A command that requires a live session was issued with none active.
    #[error("Not connected to an MCP server")]
    NotConnected,

    /// Required parameters were absent from a tool call.
    ///
    /// Carries the normalized schema so the caller can render parameter
    /// descriptions and a generated example invocation.
    #[error("Missing required parameters: {}", missing.join(", "))]
    MissingParameters {
        /// The tool whose call failed validation.
        tool: String,
        /// Required parameter names absent from the user's arguments.
        missing: Vec<String>,
        /// The normalized schema the call was validated against.
        schema: ToolSchema,
    },

    /// The named tool does not exist on the connected server.
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// The transport reported a failure while executing a tool call.
    #[error("Error calling tool {tool}: {message}")]
    ToolInvocation {
        /// The tool that was being invoked.
        tool: String,
        /// The underlying cause, as text.
        message: String,
    },

    /// A transport-level error (HTTP, JSON-RPC, wire decoding).
    #[error("Transport error: {0}")]
    Transport(String),

    /// An error from a chat channel (console, messaging runtime).
    #[error("Channel error: {0}")]
    Channel(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`TooltalkError`].
pub type TooltalkResult<T> = Result<T, TooltalkError>;

// --- Tool types ---

/// Argument mapping for a tool invocation, keyed by parameter name.
pub type CallArgs = Map<String, Value>;

/// A callable tool as reported by the server's tool listing.
///
/// The schema is kept raw as received; servers disagree on the key it lives
/// under, so deserialization accepts the common spellings and normalization
/// is deferred to the schema layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolDescriptor {
    /// The tool's wire name.
    pub name: String,
    /// Human-readable description, possibly empty.
    #[serde(default)]
    pub description: String,
    /// The raw parameter schema, whatever shape the server sent.
    #[serde(
        rename = "inputSchema",
        alias = "input_schema",
        alias = "schema",
        alias = "parameters",
        alias = "parameter_schema",
        default = "default_schema"
    )]
    pub schema: Value,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Canonical parameter schema: always a `properties` mapping plus a
/// `required` name list, with any other schema fields (title, description,
/// `type`, …) preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Parameter name → property specification (raw JSON-Schema values).
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Names of required parameters; always keys of `properties` in a
    /// well-formed schema, never internal bookkeeping names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Remaining schema fields, round-tripped untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolSchema {
    /// True when the schema carries no information at all.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.required.is_empty() && self.extra.is_empty()
    }

    /// Schema `title`, when present.
    pub fn title(&self) -> Option<&str> {
        self.extra.get("title").and_then(Value::as_str)
    }

    /// Schema-level `description`, when present.
    pub fn description(&self) -> Option<&str> {
        self.extra.get("description").and_then(Value::as_str)
    }

    /// Whether the named parameter is required.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

// --- Outcome types ---

/// Result of a successful connect, consumed by the formatter.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectOutcome {
    /// The server URL the session was established with.
    pub url: String,
    /// Number of tools discovered on connect.
    pub tool_count: usize,
}

/// Snapshot of the current connection state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Whether a session is live.
    pub connected: bool,
    /// The connected server URL, when live.
    pub url: Option<String>,
    /// Number of cached tools.
    pub tool_count: usize,
    /// Whether the session carries a bearer token.
    pub has_token: bool,
}

impl StatusReport {
    /// The disconnected snapshot.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            url: None,
            tool_count: 0,
            has_token: false,
        }
    }
}
