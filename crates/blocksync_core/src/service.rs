//! User-facing document operations.
//!
//! Every [`DocService`] call opens its own session, joins the workspace
//! once, does its load/push round trips and disconnects on every exit path.
//! Validation and placement run before the first push, and the push of the
//! mutated document is always the last network step of a mutation, so a
//! failed call never leaves a partial change on the server.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::doc::{BlockDoc, DocMeta, Insertion, PageEntry, WorkspaceIndex};
use crate::error::{BlocksyncError, Result};
use crate::export::DocumentView;
use crate::factory::{Block, build};
use crate::ids::IdGenerator;
use crate::placement::{self, ParentTarget};
use crate::schema::{AppendBlockRequest, BlockSpec, NormalizedRequest, normalize};
use crate::transport::{SyncConnector, SyncSession};

/// An encoded yrs update with no operations is two bytes.
const EMPTY_UPDATE_LEN: usize = 2;

/// Input of [`DocService::create_document`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDocument {
    /// Page title.
    pub title: String,
    /// Initial paragraph, if any.
    pub content: Option<String>,
    /// Tags for the page and its catalog entry.
    pub tags: Vec<String>,
}

impl CreateDocument {
    /// Input with just a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Add an initial paragraph.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Replace the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Output of [`DocService::create_document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentResult {
    /// Id of the new document.
    pub doc_id: String,
    /// Title as stored.
    pub title: String,
    /// Server timestamp of the initial push.
    pub timestamp: i64,
}

/// Output of [`DocService::append_block`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendBlockResult {
    /// Always `true` on success.
    pub appended: bool,
    /// Id of the new block.
    pub block_id: String,
    /// Stored `sys:flavour`.
    pub flavour: String,
    /// Canonical kind name.
    pub normalized_type: String,
    /// Legacy alias used in the request, if any.
    pub legacy_type: Option<String>,
}

/// Output of [`DocService::delete_document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Id of the deleted document.
    pub doc_id: String,
    /// Whether the catalog held an entry for it.
    pub removed_from_index: bool,
}

/// Document operations against one workspace.
pub struct DocService<C: SyncConnector> {
    connector: C,
    workspace_id: String,
    ids: Mutex<IdGenerator>,
}

impl<C: SyncConnector> DocService<C> {
    /// Service over `connector` with an entropy-seeded id generator.
    pub fn new(connector: C, workspace_id: impl Into<String>) -> Self {
        Self::with_ids(connector, workspace_id, IdGenerator::new())
    }

    /// Use a specific identifier generator, e.g. a seeded one in tests.
    pub fn with_ids(connector: C, workspace_id: impl Into<String>, ids: IdGenerator) -> Self {
        Self {
            connector,
            workspace_id: workspace_id.into(),
            ids: Mutex::new(ids),
        }
    }

    /// Workspace every operation targets.
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Connector used to open sessions.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Create a page document and register it in the workspace catalog.
    pub async fn create_document(&self, input: CreateDocument) -> Result<CreateDocumentResult> {
        let (doc_id, blocks) = {
            let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
            let doc_id = ids.next_id();
            (doc_id, initial_blocks(&input, &mut ids))
        };

        let doc = BlockDoc::new();
        doc.insert_blocks(&blocks)?;
        let meta = DocMeta {
            id: doc_id.clone(),
            title: input.title.clone(),
            create_date: chrono::Utc::now().timestamp_millis(),
            tags: input.tags.clone(),
        };
        doc.set_meta(&meta);
        let snapshot = doc.encode_snapshot();
        log::debug!("Document {doc_id}: initial snapshot {} bytes", snapshot.len());

        let mut session = self.open().await?;
        let result = self
            .create_in(&mut session, &doc_id, &snapshot, &meta)
            .await;
        close(&mut session).await;

        let timestamp = result?;
        log::info!("Created document {doc_id} ('{}')", input.title);
        Ok(CreateDocumentResult {
            doc_id,
            title: input.title,
            timestamp,
        })
    }

    async fn create_in(
        &self,
        session: &mut C::Session,
        doc_id: &str,
        snapshot: &[u8],
        meta: &DocMeta,
    ) -> Result<i64> {
        let timestamp = session
            .push_doc_update(&self.workspace_id, doc_id, snapshot)
            .await?;

        let index = self.load_index(session).await?;
        let before = index.capture_state_vector();
        index.upsert_page(&PageEntry {
            id: meta.id.clone(),
            title: meta.title.clone(),
            create_date: meta.create_date,
            tags: meta.tags.clone(),
        });
        let delta = index.diff_since(&before);
        log::debug!("Workspace index delta {} bytes", delta.len());
        session
            .push_doc_update(&self.workspace_id, &self.workspace_id, &delta)
            .await?;
        Ok(timestamp)
    }

    /// Validate, place and append one block, pushing only the delta.
    pub async fn append_block(&self, request: AppendBlockRequest) -> Result<AppendBlockResult> {
        let normalized = normalize(&request)?;

        let mut session = self.open().await?;
        let result = self.append_in(&mut session, &normalized).await;
        close(&mut session).await;

        let block = result?;
        log::info!(
            "Appended {} block {} to document {}",
            normalized.normalized_type(),
            block.id,
            normalized.doc_id
        );
        Ok(AppendBlockResult {
            appended: true,
            block_id: block.id,
            flavour: block.kind.flavour().to_string(),
            normalized_type: normalized.normalized_type().to_string(),
            legacy_type: normalized.legacy_type,
        })
    }

    async fn append_in(
        &self,
        session: &mut C::Session,
        request: &NormalizedRequest,
    ) -> Result<Block> {
        let doc = self.load_doc(session, &request.doc_id).await?;
        let before = doc.capture_state_vector();

        let resolved = placement::resolve(&doc.block_tree(), request)?;
        let insertions = {
            let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
            match &resolved.parent {
                ParentTarget::Existing(parent) => {
                    let block = build(&request.spec, Some(parent), &mut ids);
                    vec![Insertion::at(block, resolved.index)]
                }
                ParentTarget::NewNote => in_new_container(
                    &BlockSpec::default_note(),
                    &request.spec,
                    &resolved.page_id,
                    &mut ids,
                ),
                ParentTarget::NewSurface => {
                    in_new_container(&BlockSpec::Surface, &request.spec, &resolved.page_id, &mut ids)
                }
            }
        };
        doc.insert_blocks(&insertions)?;

        let delta = doc.diff_since(&before);
        log::debug!(
            "Document {}: pushing {} byte delta",
            request.doc_id,
            delta.len()
        );
        session
            .push_doc_update(&self.workspace_id, &request.doc_id, &delta)
            .await?;

        let appended = insertions
            .into_iter()
            .last()
            .map(|insertion| insertion.block)
            .ok_or_else(|| BlocksyncError::Crdt("Nothing was inserted".to_string()))?;
        Ok(appended)
    }

    /// Remove a document from the catalog and ask the server to delete it.
    pub async fn delete_document(&self, doc_id: &str) -> Result<DeleteResult> {
        let mut session = self.open().await?;
        let result = self.delete_in(&mut session, doc_id).await;
        close(&mut session).await;

        let removed_from_index = result?;
        log::info!("Deleted document {doc_id} (catalog entry removed: {removed_from_index})");
        Ok(DeleteResult {
            doc_id: doc_id.to_string(),
            removed_from_index,
        })
    }

    async fn delete_in(&self, session: &mut C::Session, doc_id: &str) -> Result<bool> {
        let index = self.load_index(session).await?;
        let before = index.capture_state_vector();
        let removed = index.remove_page(doc_id);
        let delta = index.diff_since(&before);
        if removed && delta.len() > EMPTY_UPDATE_LEN {
            session
                .push_doc_update(&self.workspace_id, &self.workspace_id, &delta)
                .await?;
        }
        session.delete_doc(&self.workspace_id, doc_id).await?;
        Ok(removed)
    }

    /// Load a document and return its read view.
    pub async fn read_document(&self, doc_id: &str) -> Result<DocumentView> {
        let mut session = self.open().await?;
        let result = self.load_doc(&mut session, doc_id).await;
        close(&mut session).await;

        let mut view = DocumentView::from_doc(&result?);
        if view.id.is_empty() {
            view.id = doc_id.to_string();
        }
        Ok(view)
    }

    /// Catalog entries of the workspace.
    pub async fn list_documents(&self) -> Result<Vec<PageEntry>> {
        let mut session = self.open().await?;
        let result = self.load_index(&mut session).await;
        close(&mut session).await;
        Ok(result?.pages())
    }

    // ==================== Session plumbing ====================

    /// Connect and join the workspace. A failed join still disconnects.
    async fn open(&self) -> Result<C::Session> {
        let mut session = self.connector.connect().await?;
        if let Err(e) = session.join(&self.workspace_id).await {
            close(&mut session).await;
            return Err(e);
        }
        Ok(session)
    }

    async fn load_doc(&self, session: &mut C::Session, doc_id: &str) -> Result<BlockDoc> {
        match session.load_doc(&self.workspace_id, doc_id).await? {
            Some(snapshot) => {
                log::debug!("Document {doc_id}: loaded {} bytes", snapshot.len());
                BlockDoc::from_snapshot(&snapshot)
            }
            None => Err(BlocksyncError::DocumentNotFound(doc_id.to_string())),
        }
    }

    /// The workspace catalog, empty when the server has none yet.
    async fn load_index(&self, session: &mut C::Session) -> Result<WorkspaceIndex> {
        match session
            .load_doc(&self.workspace_id, &self.workspace_id)
            .await?
        {
            Some(snapshot) => WorkspaceIndex::from_snapshot(&snapshot),
            None => Ok(WorkspaceIndex::new()),
        }
    }
}

impl<C: SyncConnector + std::fmt::Debug> std::fmt::Debug for DocService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocService")
            .field("connector", &self.connector)
            .field("workspace_id", &self.workspace_id)
            .finish()
    }
}

/// Best-effort disconnect.
async fn close<S: SyncSession>(session: &mut S) {
    if let Err(e) = session.disconnect().await {
        log::warn!("Failed to disconnect cleanly: {e}");
    }
}

/// A container under the page, then the block inside it.
fn in_new_container(
    container: &BlockSpec,
    spec: &BlockSpec,
    page_id: &str,
    ids: &mut IdGenerator,
) -> Vec<Insertion> {
    let container = build(container, Some(page_id), ids);
    log::debug!("Creating missing {} {}", container.kind.name(), container.id);
    let block = build(spec, Some(&container.id), ids);
    vec![Insertion::append(container), Insertion::append(block)]
}

/// Page, surface and note, plus a paragraph when there is content.
fn initial_blocks(input: &CreateDocument, ids: &mut IdGenerator) -> Vec<Insertion> {
    let page = build(
        &BlockSpec::Page {
            title: input.title.clone(),
        },
        None,
        ids,
    );
    let surface = build(&BlockSpec::Surface, Some(&page.id), ids);
    let note = build(&BlockSpec::default_note(), Some(&page.id), ids);
    let paragraph = input
        .content
        .as_ref()
        .filter(|content| !content.is_empty())
        .map(|content| {
            build(
                &BlockSpec::Paragraph {
                    text: content.clone(),
                },
                Some(&note.id),
                ids,
            )
        });

    let mut blocks = vec![
        Insertion::append(page),
        Insertion::append(surface),
        Insertion::append(note),
    ];
    blocks.extend(paragraph.map(Insertion::append));
    blocks
}
