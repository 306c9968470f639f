//! # graphmem - Persistent knowledge-graph memory service
//!
//! A storage and query engine for a graph of entities, observations, and
//! typed relations, backed by `libsql` with full-text, vector, and hybrid
//! search over the same connection.
//!
//! graphmem provides:
//! - **Entity/observation/relation storage** with transactional writes
//! - **Text search** via SQLite FTS5, with a LIKE fallback when unavailable
//! - **Vector search** via libsql's native `vector_top_k` index, with an
//!   exact-scan fallback
//! - **Hybrid search** combining both with Reciprocal Rank Fusion
//! - **Graph traversal**: neighbors, bounded walks, shortest path
//! - **An MCP server** for AI agent integration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graphmem::{Config, ConnectionManager, ToolService};
//! use graphmem::store::EntityInput;
//!
//! #[tokio::main]
//! async fn main() -> graphmem::Result<()> {
//!     let manager = ConnectionManager::new(Config::default());
//!     let service = ToolService::new(manager, None, graphmem::metrics::default_recorder());
//!
//!     service.create_entities(None, vec![EntityInput {
//!         name: "alice".to_string(),
//!         entity_type: "person".to_string(),
//!         observations: vec!["likes rust".to_string()],
//!         embedding: None,
//!     }], None).await?;
//!
//!     let result = service.search_nodes(None, serde_json::json!("rust"), None, None, None).await?;
//!     println!("{:?}", result.graph);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod mcp;
pub mod metrics;
pub mod search;
pub mod service;
pub mod store;
pub mod traversal;

pub use config::Config;
pub use error::{Error, Result};
pub use manager::ConnectionManager;
pub use mcp::McpServer;
pub use service::ToolService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default single-tenant database path, used when the caller supplies none
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("graphmem")
        .join("graphmem.db")
}
