//! Model Context Protocol over stdio: client, transports and a resource server.
//!
//! Both external collaborators are MCP servers: the Playwright browser server
//! supplies tools, and the board server (when configured) supplies resources.
//! [`McpResourceServer`] is that board server, serving local resources to
//! other MCP clients.

mod client;
mod server;
mod transport;
pub mod types;

pub use client::McpClient;
pub use server::McpResourceServer;
pub use transport::{LineTransport, StdioTransport, Transport};

#[cfg(test)]
pub(crate) use client::tests::MockTransport;
