#![doc = include_str!(concat!(env!("OUT_DIR"), "/README.md"))]
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// CRDT document model (page documents and the workspace catalog)
pub mod doc;

/// Error (common error types)
pub mod error;

/// Read view and Markdown flattening
pub mod export;

/// Block factory (property sets per kind)
pub mod factory;

/// Identifier generation
pub mod ids;

/// Placement resolution and containment rules
pub mod placement;

/// Block schema, legacy aliases and request normalization
pub mod schema;

/// Document operations (create, append, read, delete, list)
pub mod service;

/// Sync transport (Socket.IO client and in-memory remote)
pub mod transport;

/// Read-only block tree navigation
pub mod tree;
