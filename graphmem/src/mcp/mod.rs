//! MCP (Model Context Protocol) server for graphmem
//!
//! This module implements an MCP server using a line-delimited stdio
//! transport, exposing the knowledge-graph tool surface to AI agents.
//!
//! ## Tools Exposed
//!
//! `create_entities`, `add_observations`, `update_entities`,
//! `create_relations`, `update_relations`, `delete_entity`/`delete_entities`,
//! `delete_relation`/`delete_relations`, `delete_observations`, `open_nodes`,
//! `read_graph`, `search_nodes`, `neighbors`, `walk`, `shortest_path`,
//! `health_check`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graphmem::mcp::McpServer;
//! use graphmem::service::ToolService;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = ToolService::new(manager, provider, recorder);
//!     let server = McpServer::new(service);
//!     server.run().await.unwrap();
//! }
//! ```

mod protocol;
mod server;
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolDefinition, ToolResult};
pub use server::McpServer;
