//! MCP wire layer: JSON-RPC 2.0 message types, the [`ToolTransport`]
//! abstraction the session layer talks to, and the Streamable HTTP client.

pub mod http;
pub mod protocol;
pub mod transport;

pub use http::HttpTransport;
pub use transport::ToolTransport;
