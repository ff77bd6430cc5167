//! In-process remote authority.
//!
//! [`MemoryRemote`] keeps one yrs document per `(space, doc)` pair, merges
//! every pushed update into it and records what it saw. Sessions share the
//! remote's state, so a test can drive a service and then inspect the
//! result. Faults can be switched on to exercise error paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use yrs::updates::decoder::Decode;
use yrs::{Doc, ReadTxn, StateVector, Transact, Update};

use super::{SyncConnector, SyncSession};
use crate::error::{BlocksyncError, Result};

/// Switchable failure modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Answer joins with an error.
    pub refuse_join: bool,
    /// Answer pushes with an error.
    pub refuse_push: bool,
    /// Never acknowledge anything; requests run into their timeout.
    pub never_ack: bool,
}

/// One accepted push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRecord {
    /// Space the update was pushed to.
    pub space_id: String,
    /// Target document.
    pub doc_id: String,
    /// The update bytes as received.
    pub update: Vec<u8>,
    /// Clock value returned in the ack.
    pub timestamp: i64,
}

#[derive(Default)]
struct RemoteState {
    docs: HashMap<(String, String), Doc>,
    pushes: Vec<PushRecord>,
    deletes: Vec<(String, String)>,
    joins: Vec<String>,
    connections: usize,
    disconnects: usize,
    faults: Faults,
    clock: i64,
}

/// Shared in-memory remote. Cloning shares the state.
#[derive(Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
    request_timeout: Duration,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// An empty remote with a 200 ms `never_ack` timeout.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RemoteState::default())),
            request_timeout: Duration::from_millis(200),
        }
    }

    /// How long a session waits before giving up when `never_ack` is set.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the active failure modes.
    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Seed a document with `update`, as if another client had pushed it.
    pub fn seed(&self, space_id: &str, doc_id: &str, update: &[u8]) -> Result<()> {
        let mut state = self.lock();
        let doc = state
            .docs
            .entry((space_id.to_string(), doc_id.to_string()))
            .or_default();
        apply(doc, update)
    }

    /// Current full state of a document.
    pub fn snapshot(&self, space_id: &str, doc_id: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        let doc = state.docs.get(&(space_id.to_string(), doc_id.to_string()))?;
        Some(
            doc.transact()
                .encode_state_as_update_v1(&StateVector::default()),
        )
    }

    /// Whether the remote holds `doc_id` in `space_id`.
    pub fn contains(&self, space_id: &str, doc_id: &str) -> bool {
        self.lock()
            .docs
            .contains_key(&(space_id.to_string(), doc_id.to_string()))
    }

    /// Every accepted push, oldest first.
    pub fn pushes(&self) -> Vec<PushRecord> {
        self.lock().pushes.clone()
    }

    /// Accepted pushes for one document.
    pub fn pushes_for(&self, doc_id: &str) -> Vec<PushRecord> {
        self.lock()
            .pushes
            .iter()
            .filter(|p| p.doc_id == doc_id)
            .cloned()
            .collect()
    }

    /// Delete notices as `(space, doc)` pairs.
    pub fn deletes(&self) -> Vec<(String, String)> {
        self.lock().deletes.clone()
    }

    /// Spaces joined, one entry per join.
    pub fn joins(&self) -> Vec<String> {
        self.lock().joins.clone()
    }

    /// Sessions opened so far.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Sessions disconnected so far.
    pub fn disconnects(&self) -> usize {
        self.lock().disconnects
    }

    /// Documents known per space.
    pub fn doc_ids(&self, space_id: &str) -> HashSet<String> {
        self.lock()
            .docs
            .keys()
            .filter(|(space, _)| space == space_id)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

impl std::fmt::Debug for MemoryRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryRemote")
            .field("docs", &state.docs.len())
            .field("pushes", &state.pushes.len())
            .field("faults", &state.faults)
            .finish()
    }
}

#[async_trait]
impl SyncConnector for MemoryRemote {
    type Session = MemorySession;

    async fn connect(&self) -> Result<MemorySession> {
        self.lock().connections += 1;
        Ok(MemorySession {
            remote: self.clone(),
            joined: HashSet::new(),
            closed: false,
        })
    }
}

/// Session on a [`MemoryRemote`].
#[derive(Debug)]
pub struct MemorySession {
    remote: MemoryRemote,
    joined: HashSet<String>,
    closed: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(BlocksyncError::ConnectionClosed);
        }
        Ok(())
    }

    fn ensure_joined(&self, space_id: &str) -> Result<()> {
        if self.joined.contains(space_id) {
            Ok(())
        } else {
            Err(BlocksyncError::Protocol(format!(
                "Space '{space_id}' has not been joined"
            )))
        }
    }

    /// Wait out the request timeout when acknowledgments are suppressed.
    async fn stall_if_silent(&self) -> bool {
        let silent = self.remote.lock().faults.never_ack;
        if silent {
            tokio::time::sleep(self.remote.request_timeout).await;
        }
        silent
    }
}

#[async_trait]
impl SyncSession for MemorySession {
    async fn join(&mut self, space_id: &str) -> Result<()> {
        self.ensure_open()?;
        if self.stall_if_silent().await {
            return Err(BlocksyncError::JoinTimeout(space_id.to_string()));
        }
        let mut state = self.remote.lock();
        if state.faults.refuse_join {
            return Err(BlocksyncError::JoinFailed(
                "SPACE_ACCESS_DENIED: join refused".to_string(),
            ));
        }
        state.joins.push(space_id.to_string());
        drop(state);
        self.joined.insert(space_id.to_string());
        Ok(())
    }

    async fn load_doc(&mut self, space_id: &str, doc_id: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        self.ensure_joined(space_id)?;
        if self.stall_if_silent().await {
            return Err(BlocksyncError::LoadFailed(format!(
                "No acknowledgment within {} ms",
                self.remote.request_timeout.as_millis()
            )));
        }
        Ok(self.remote.snapshot(space_id, doc_id))
    }

    async fn push_doc_update(&mut self, space_id: &str, doc_id: &str, update: &[u8]) -> Result<i64> {
        self.ensure_open()?;
        self.ensure_joined(space_id)?;
        if self.stall_if_silent().await {
            return Err(BlocksyncError::PushFailed(format!(
                "No acknowledgment within {} ms",
                self.remote.request_timeout.as_millis()
            )));
        }
        let mut state = self.remote.lock();
        if state.faults.refuse_push {
            return Err(BlocksyncError::PushFailed(
                "INTERNAL_SERVER_ERROR: push refused".to_string(),
            ));
        }
        let doc = state
            .docs
            .entry((space_id.to_string(), doc_id.to_string()))
            .or_default();
        apply(doc, update).map_err(|e| BlocksyncError::PushFailed(e.to_string()))?;
        state.clock += 1;
        let timestamp = state.clock;
        state.pushes.push(PushRecord {
            space_id: space_id.to_string(),
            doc_id: doc_id.to_string(),
            update: update.to_vec(),
            timestamp,
        });
        Ok(timestamp)
    }

    async fn delete_doc(&mut self, space_id: &str, doc_id: &str) -> Result<()> {
        self.ensure_open()?;
        self.ensure_joined(space_id)?;
        let mut state = self.remote.lock();
        state
            .docs
            .remove(&(space_id.to_string(), doc_id.to_string()));
        state
            .deletes
            .push((space_id.to_string(), doc_id.to_string()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.remote.lock().disconnects += 1;
        }
        Ok(())
    }
}

fn apply(doc: &Doc, update: &[u8]) -> Result<()> {
    let update = Update::decode_v1(update)
        .map_err(|e| BlocksyncError::Crdt(format!("Failed to decode update: {e}")))?;
    doc.transact_mut()
        .apply_update(update)
        .map_err(|e| BlocksyncError::Crdt(format!("Failed to apply update: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yrs::{GetString, Text};

    fn text_update(content: &str) -> Vec<u8> {
        let doc = Doc::new();
        let text = doc.get_or_insert_text("t");
        text.insert(&mut doc.transact_mut(), 0, content);
        doc.transact()
            .encode_state_as_update_v1(&StateVector::default())
    }

    #[tokio::test]
    async fn test_push_then_load() {
        let remote = MemoryRemote::new();
        let mut session = remote.connect().await.unwrap();
        session.join("ws").await.unwrap();
        assert_eq!(session.load_doc("ws", "d").await.unwrap(), None);

        let ts = session
            .push_doc_update("ws", "d", &text_update("hi"))
            .await
            .unwrap();
        assert_eq!(ts, 1);

        let snapshot = session.load_doc("ws", "d").await.unwrap().unwrap();
        let doc = Doc::new();
        let text = doc.get_or_insert_text("t");
        apply(&doc, &snapshot).unwrap();
        assert_eq!(text.get_string(&doc.transact()), "hi");

        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();
        assert_eq!(remote.connections(), 1);
        assert_eq!(remote.disconnects(), 1);
        assert_eq!(remote.joins(), vec!["ws".to_string()]);
    }

    #[tokio::test]
    async fn test_requests_require_join() {
        let remote = MemoryRemote::new();
        let mut session = remote.connect().await.unwrap();
        assert!(session.load_doc("ws", "d").await.is_err());
    }

    #[tokio::test]
    async fn test_faults() {
        let remote = MemoryRemote::new().with_request_timeout(Duration::from_millis(10));
        remote.set_faults(Faults {
            refuse_join: true,
            ..Default::default()
        });
        let mut session = remote.connect().await.unwrap();
        assert!(matches!(
            session.join("ws").await,
            Err(BlocksyncError::JoinFailed(_))
        ));

        remote.set_faults(Faults {
            never_ack: true,
            ..Default::default()
        });
        assert!(matches!(
            session.join("ws").await,
            Err(BlocksyncError::JoinTimeout(_))
        ));

        remote.set_faults(Faults {
            refuse_push: true,
            ..Default::default()
        });
        session.join("ws").await.unwrap();
        let err = session
            .push_doc_update("ws", "d", &text_update("x"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(remote.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_recorded() {
        let remote = MemoryRemote::new();
        remote.seed("ws", "d", &text_update("x")).unwrap();
        let mut session = remote.connect().await.unwrap();
        session.join("ws").await.unwrap();
        session.delete_doc("ws", "d").await.unwrap();
        assert!(!remote.contains("ws", "d"));
        assert_eq!(remote.deletes(), vec![("ws".to_string(), "d".to_string())]);
    }
}
