//! Transport abstraction between the session layer and a concrete MCP
//! server connection.

use async_trait::async_trait;
use serde_json::Value;
use tooltalk_core::{CallArgs, ToolDescriptor, TooltalkResult};

/// A connection to one MCP server at a time.
///
/// Implementations hold whatever wire state the protocol needs (HTTP session
/// ids, request counters) and can be retargeted: a second `connect` replaces
/// the previous server. All methods other than `connect` fail with
/// [`tooltalk_core::TooltalkError::NotConnected`] while no server is attached.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Perform the protocol handshake against `url` and return the tools the
    /// server advertises. A bearer `token` is attached to every request when
    /// given.
    async fn connect(&mut self, url: &str, token: Option<&str>)
        -> TooltalkResult<Vec<ToolDescriptor>>;

    /// Tear down the current connection. Succeeds even when the server has
    /// already gone away.
    async fn disconnect(&mut self) -> TooltalkResult<()>;

    /// Fetch a fresh tool listing from the connected server.
    async fn list_tools(&mut self) -> TooltalkResult<Vec<ToolDescriptor>>;

    /// Invoke a tool by wire name and return the raw result payload exactly
    /// as the server sent it.
    async fn call_tool(&mut self, name: &str, arguments: CallArgs) -> TooltalkResult<Value>;
}
