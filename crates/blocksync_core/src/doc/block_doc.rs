//! Page document: the block tree plus document metadata.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
    Any, Array, ArrayPrelim, ArrayRef, Doc, Map, MapPrelim, MapRef, Out, ReadTxn, StateVector,
    Text, Transact, TransactionMut, Update,
};

use super::values::{out_to_json, out_to_number, out_to_string, out_to_strings, write_prop};
use crate::error::{BlocksyncError, Result};
use crate::factory::Block;
use crate::tree::{BlockEntry, BlockTree, ChildEntry};

const BLOCKS_MAP_NAME: &str = "blocks";
const META_MAP_NAME: &str = "meta";

const SYS_ID: &str = "sys:id";
const SYS_FLAVOUR: &str = "sys:flavour";
const SYS_VERSION: &str = "sys:version";
const SYS_PARENT: &str = "sys:parent";
const SYS_CHILDREN: &str = "sys:children";
const PROP_PREFIX: &str = "prop:";

/// Document-level metadata stored in the `meta` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocMeta {
    /// Document id; the index entry uses the same id.
    pub id: String,
    /// Page title, mirrored in the page block.
    pub title: String,
    /// Milliseconds since the Unix epoch.
    pub create_date: i64,
    /// Free-form tags, mirrored in the index entry.
    pub tags: Vec<String>,
}

/// A block to link into the document, at `index` in its parent's children
/// or at the end.
#[derive(Debug, Clone)]
pub struct Insertion {
    /// Block to write; its `parent` decides where it is linked.
    pub block: Block,
    /// Position among the parent's children; `None` appends.
    pub index: Option<usize>,
}

impl Insertion {
    /// Link at the end of the parent's children.
    pub fn append(block: Block) -> Self {
        Self { block, index: None }
    }

    /// Link at `index`, clamped to the parent's child count.
    pub fn at(block: Block, index: usize) -> Self {
        Self {
            block,
            index: Some(index),
        }
    }
}

/// A page document.
///
/// Wraps a yrs [`Doc`] holding a `blocks` map (id → block map) and a `meta`
/// map. Mutations go through [`BlockDoc::insert_blocks`] and
/// [`BlockDoc::set_meta`]; pair them with [`BlockDoc::capture_state_vector`]
/// and [`BlockDoc::diff_since`] to get the delta to push.
pub struct BlockDoc {
    doc: Doc,
    blocks: MapRef,
    meta: MapRef,
}

impl BlockDoc {
    /// Create an empty document.
    pub fn new() -> Self {
        let doc = Doc::new();
        let blocks = doc.get_or_insert_map(BLOCKS_MAP_NAME);
        let meta = doc.get_or_insert_map(META_MAP_NAME);
        Self { doc, blocks, meta }
    }

    /// Create a document from a snapshot.
    pub fn from_snapshot(snapshot: &[u8]) -> Result<Self> {
        let doc = Self::new();
        doc.load(snapshot)?;
        Ok(doc)
    }

    /// Get the underlying yrs document.
    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    // ==================== Sync Primitives ====================

    /// Apply a snapshot or delta.
    pub fn load(&self, update: &[u8]) -> Result<()> {
        let update = Update::decode_v1(update)
            .map_err(|e| BlocksyncError::Crdt(format!("Failed to decode update: {e}")))?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| BlocksyncError::Crdt(format!("Failed to apply update: {e}")))
    }

    /// Summary of the operations applied so far.
    pub fn capture_state_vector(&self) -> StateVector {
        self.doc.transact().state_vector()
    }

    /// Operations not covered by `state_vector`.
    pub fn diff_since(&self, state_vector: &StateVector) -> Vec<u8> {
        self.doc.transact().encode_state_as_update_v1(state_vector)
    }

    /// The whole document as one update.
    pub fn encode_snapshot(&self) -> Vec<u8> {
        self.diff_since(&StateVector::default())
    }

    /// Encoded state vector, for peers that ask for it.
    pub fn encode_state_vector(&self) -> Vec<u8> {
        self.capture_state_vector().encode_v1()
    }

    // ==================== Metadata ====================

    /// Read the `meta` map, with defaults for absent keys.
    pub fn meta(&self) -> DocMeta {
        let txn = self.doc.transact();
        let read = |key: &str| self.meta.get(&txn, key);
        DocMeta {
            id: read("id")
                .and_then(|v| out_to_string(&v, &txn))
                .unwrap_or_default(),
            title: read("title")
                .and_then(|v| out_to_string(&v, &txn))
                .unwrap_or_default(),
            create_date: read("createDate")
                .and_then(|v| out_to_number(&v))
                .unwrap_or_default() as i64,
            tags: read("tags")
                .map(|v| out_to_strings(&v, &txn))
                .unwrap_or_default(),
        }
    }

    /// Overwrite the `meta` map.
    pub fn set_meta(&self, meta: &DocMeta) {
        let mut txn = self.doc.transact_mut();
        self.meta.insert(&mut txn, "id", meta.id.as_str());
        self.meta.insert(&mut txn, "title", meta.title.as_str());
        self.meta
            .insert(&mut txn, "createDate", Any::Number(meta.create_date as f64));
        let tags = self.meta.insert(&mut txn, "tags", ArrayPrelim::default());
        for tag in &meta.tags {
            tags.push_back(&mut txn, tag.as_str());
        }
    }

    // ==================== Blocks ====================

    /// Snapshot of the block tree for navigation and placement.
    pub fn block_tree(&self) -> BlockTree {
        let txn = self.doc.transact();
        let mut tree = BlockTree::new();
        for (key, value) in self.blocks.iter(&txn) {
            if let Out::YMap(block) = value {
                tree.insert(read_entry(key, &block, &txn));
            }
        }
        tree
    }

    /// Whether a block with `id` exists.
    pub fn contains_block(&self, id: &str) -> bool {
        let txn = self.doc.transact();
        matches!(self.blocks.get(&txn, id), Some(Out::YMap(_)))
    }

    /// Number of blocks, linked or not.
    pub fn block_count(&self) -> usize {
        let txn = self.doc.transact();
        self.blocks.len(&txn) as usize
    }

    /// `prop:*` values of a block as JSON, keyed without the prefix.
    pub fn block_props(&self, id: &str) -> Option<IndexMap<String, Value>> {
        let txn = self.doc.transact();
        let Some(Out::YMap(block)) = self.blocks.get(&txn, id) else {
            return None;
        };
        let mut props: IndexMap<String, Value> = block
            .iter(&txn)
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(PROP_PREFIX)?;
                Some((name.to_string(), out_to_json(&value, &txn)))
            })
            .collect();
        props.sort_keys();
        Some(props)
    }

    /// A text property as a plain string.
    pub fn text(&self, id: &str, key: &str) -> Option<String> {
        let txn = self.doc.transact();
        let Some(Out::YMap(block)) = self.blocks.get(&txn, id) else {
            return None;
        };
        let value = block.get(&txn, &format!("{PROP_PREFIX}{key}"))?;
        out_to_string(&value, &txn)
    }

    /// Append to a text property, creating it when absent.
    pub fn append_text(&self, id: &str, key: &str, chunk: &str) -> Result<()> {
        let mut txn = self.doc.transact_mut();
        let block = self.block_map(&txn, id)?;
        let prop = format!("{PROP_PREFIX}{key}");
        match block.get(&txn, &prop) {
            Some(Out::YText(text)) => {
                let end = text.len(&txn);
                text.insert(&mut txn, end, chunk);
            }
            Some(Out::Any(Any::String(existing))) => {
                let joined = format!("{existing}{chunk}");
                block.insert(&mut txn, prop, super::values::new_text(&joined));
            }
            _ => {
                block.insert(&mut txn, prop, super::values::new_text(chunk));
            }
        }
        Ok(())
    }

    /// Write blocks and link each into its parent, all in one transaction.
    ///
    /// Parents must already exist or come earlier in `insertions`; this is
    /// checked before anything is written.
    pub fn insert_blocks(&self, insertions: &[Insertion]) -> Result<()> {
        let mut txn = self.doc.transact_mut();

        for (i, insertion) in insertions.iter().enumerate() {
            let Some(parent) = insertion.block.parent.as_deref() else {
                continue;
            };
            let earlier = insertions[..i].iter().any(|p| p.block.id == parent);
            if !earlier && !matches!(self.blocks.get(&txn, parent), Some(Out::YMap(_))) {
                return Err(BlocksyncError::Crdt(format!(
                    "Parent block '{parent}' of '{}' does not exist",
                    insertion.block.id
                )));
            }
        }

        for insertion in insertions {
            self.write_block(&mut txn, &insertion.block);
            if let Some(parent) = insertion.block.parent.as_deref() {
                let parent = self.block_map(&txn, parent)?;
                let children = children_array(&parent, &mut txn);
                let len = children.len(&txn);
                let index = insertion
                    .index
                    .map_or(len, |i| (i as u32).min(len));
                children.insert(&mut txn, index, insertion.block.id.as_str());
            }
        }
        Ok(())
    }

    fn write_block(&self, txn: &mut TransactionMut, block: &Block) {
        let map = self
            .blocks
            .insert(txn, block.id.as_str(), MapPrelim::default());
        map.insert(txn, SYS_ID, block.id.as_str());
        map.insert(txn, SYS_FLAVOUR, block.flavour());
        map.insert(txn, SYS_VERSION, Any::Number(f64::from(block.version())));
        match &block.parent {
            Some(parent) => map.insert(txn, SYS_PARENT, parent.as_str()),
            None => map.insert(txn, SYS_PARENT, Any::Null),
        };
        let children = map.insert(txn, SYS_CHILDREN, ArrayPrelim::default());
        for child in &block.children {
            children.push_back(txn, child.as_str());
        }
        for (key, value) in &block.props {
            write_prop(&map, txn, &format!("{PROP_PREFIX}{key}"), value);
        }
    }

    fn block_map<T: ReadTxn>(&self, txn: &T, id: &str) -> Result<MapRef> {
        match self.blocks.get(txn, id) {
            Some(Out::YMap(map)) => Ok(map),
            _ => Err(BlocksyncError::Crdt(format!("Block '{id}' is missing"))),
        }
    }
}

impl Default for BlockDoc {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlockDoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDoc")
            .field("blocks", &self.block_count())
            .finish()
    }
}

/// The parent's child list as a shared array.
///
/// A missing list, or one stored as a plain array, is replaced by a shared
/// array carrying the same ids.
fn children_array(parent: &MapRef, txn: &mut TransactionMut) -> ArrayRef {
    let existing = parent.get(&*txn, SYS_CHILDREN);
    if let Some(Out::YArray(array)) = existing {
        return array;
    }
    let ids: Vec<String> = existing
        .map(|value| {
            child_entries(&value, &*txn)
                .into_iter()
                .map(|entry| entry.id().to_string())
                .collect()
        })
        .unwrap_or_default();
    let array = parent.insert(txn, SYS_CHILDREN, ArrayPrelim::default());
    for id in ids {
        array.push_back(txn, id);
    }
    array
}

fn read_entry<T: ReadTxn>(key: &str, block: &MapRef, txn: &T) -> BlockEntry {
    let string = |name: &str| block.get(txn, name).and_then(|v| out_to_string(&v, txn));
    BlockEntry {
        id: string(SYS_ID).unwrap_or_else(|| key.to_string()),
        flavour: string(SYS_FLAVOUR).unwrap_or_default(),
        block_type: string("prop:type"),
        parent: string(SYS_PARENT).filter(|p| !p.is_empty()),
        children: block
            .get(txn, SYS_CHILDREN)
            .map(|value| child_entries(&value, txn))
            .unwrap_or_default(),
        text: string("prop:text"),
    }
}

/// Decode a stored child list, accepting bare ids and one-element arrays.
fn child_entries<T: ReadTxn>(value: &Out, txn: &T) -> Vec<ChildEntry> {
    match value {
        Out::YArray(array) => array
            .iter(txn)
            .filter_map(|item| match item {
                Out::Any(any) => any_child_entry(&any),
                Out::YArray(inner) if inner.len(txn) == 1 => inner
                    .get(txn, 0)
                    .and_then(|id| out_to_string(&id, txn))
                    .map(ChildEntry::Wrapped),
                _ => None,
            })
            .collect(),
        Out::Any(Any::Array(items)) => items.iter().filter_map(any_child_entry).collect(),
        _ => Vec::new(),
    }
}

fn any_child_entry(any: &Any) -> Option<ChildEntry> {
    match any {
        Any::String(id) => Some(ChildEntry::Id(id.to_string())),
        Any::Array(items) if items.len() == 1 => match &items[0] {
            Any::String(id) => Some(ChildEntry::Wrapped(id.to_string())),
            _ => None,
        },
        _ => None,
    }
}
