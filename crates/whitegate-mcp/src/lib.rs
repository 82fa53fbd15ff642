//! Whitegate MCP server
//!
//! Line-oriented JSON-RPC engine and the whitelist tool handlers. The
//! protocol contract lives in [`engine`]; tool input contracts are
//! declarative tables in [`schema`] interpreted by one generic validator.

pub mod engine;
pub mod ip;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod tools;

pub use engine::{Engine, PROTOCOL_VERSION, SERVER_NAME};
pub use server::run_server;
pub use tools::{ToolContext, ToolError, ToolName};
