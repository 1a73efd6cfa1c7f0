//! Tool server over the Model Context Protocol
//!
//! JSON-RPC 2.0, one message per line on stdin and stdout. Logging goes to
//! stderr so it never mixes with the transport.

pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::{McpServer, ServerState};
pub use tools::{Tool, ToolContext, ToolRegistry};
