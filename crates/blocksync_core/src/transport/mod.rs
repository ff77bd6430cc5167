#![doc = include_str!(concat!(env!("OUT_DIR"), "/transport_README.md"))]

use async_trait::async_trait;

use crate::error::Result;

mod memory;
/// Wire packets and event payloads.
pub mod packet;
mod socket_io;

pub use memory::{Faults, MemoryRemote, MemorySession, PushRecord};
pub use socket_io::{SocketIoConnector, SocketIoSession};

/// Space type sent with every request.
pub const SPACE_TYPE: &str = "workspace";

/// Opens sessions against a remote authority.
///
/// Each operation gets its own session; sessions are never pooled.
#[async_trait]
pub trait SyncConnector: Send + Sync {
    /// Session type this connector opens.
    type Session: SyncSession;

    /// Open a connection. Fails with
    /// [`BlocksyncError::ConnectTimeout`](crate::error::BlocksyncError::ConnectTimeout)
    /// when the connection is not up within the configured bound.
    async fn connect(&self) -> Result<Self::Session>;
}

/// One connected session.
///
/// Every call waits for its acknowledgment or its timeout; there are no
/// retries. Once a call fails the session should only be disconnected.
#[async_trait]
pub trait SyncSession: Send {
    /// Register interest in a space.
    async fn join(&mut self, space_id: &str) -> Result<()>;

    /// Fetch a document snapshot. `None` when the server does not know the
    /// document.
    async fn load_doc(&mut self, space_id: &str, doc_id: &str) -> Result<Option<Vec<u8>>>;

    /// Submit an update and return the server timestamp.
    async fn push_doc_update(&mut self, space_id: &str, doc_id: &str, update: &[u8])
    -> Result<i64>;

    /// Ask the server to delete a document. Not acknowledged.
    async fn delete_doc(&mut self, space_id: &str, doc_id: &str) -> Result<()>;

    /// Close the session. Safe to call more than once.
    async fn disconnect(&mut self) -> Result<()>;
}
