//! MCP over JSON-RPC 2.0
//!
//! Protocol types, a transport-independent handler and the stdio transport.
//! The HTTP transport lives in [`crate::api`].

mod handler;
pub mod protocol;
mod stdio;

pub use handler::{RpcHandler, call_result};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use stdio::{serve, serve_stdio};
