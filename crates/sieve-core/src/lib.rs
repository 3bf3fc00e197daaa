//! Sieve Core - tools and protocol handling on top of the sandbox
//!
//! Shared by every frontend: the stdio MCP server and the one-shot CLI
//! commands resolve tools and run them through the same code.

pub mod mcp;
pub mod templates;
pub mod tools;

pub use mcp::McpServer;
pub use tools::{builtin_tools, call_tool, discover, ToolDescriptor, ToolError};
