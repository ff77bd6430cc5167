//! Workspace catalog document.
//!
//! A separate document per workspace whose `meta` map holds a `pages`
//! array, one entry per page document:
//!
//! ```text
//! Y.Doc
//! └── Y.Map "meta"
//!     └── "pages" → Y.Array
//!         ├── Y.Map { id, title, createDate, tags: Y.Array<string> }
//!         └── ...
//! ```

use serde::{Deserialize, Serialize};
use yrs::updates::decoder::Decode;
use yrs::{
    Any, Array, ArrayPrelim, ArrayRef, Doc, Map, MapPrelim, MapRef, Out, ReadTxn, StateVector,
    Transact, TransactionMut, Update,
};

use super::values::{any_to_json, out_to_number, out_to_string, out_to_strings};
use crate::error::{BlocksyncError, Result};

const META_MAP_NAME: &str = "meta";
const PAGES_KEY: &str = "pages";

/// One catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
    /// Page document id.
    pub id: String,
    /// Page title at creation.
    pub title: String,
    /// Milliseconds since the Unix epoch.
    pub create_date: i64,
    /// Page tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The workspace catalog.
pub struct WorkspaceIndex {
    doc: Doc,
    meta: MapRef,
}

impl WorkspaceIndex {
    /// An empty catalog.
    pub fn new() -> Self {
        let doc = Doc::new();
        let meta = doc.get_or_insert_map(META_MAP_NAME);
        Self { doc, meta }
    }

    /// A catalog loaded from a snapshot.
    pub fn from_snapshot(snapshot: &[u8]) -> Result<Self> {
        let index = Self::new();
        index.load(snapshot)?;
        Ok(index)
    }

    /// Apply a snapshot or delta.
    pub fn load(&self, update: &[u8]) -> Result<()> {
        let update = Update::decode_v1(update)
            .map_err(|e| BlocksyncError::Crdt(format!("Failed to decode index update: {e}")))?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| BlocksyncError::Crdt(format!("Failed to apply index update: {e}")))
    }

    /// State vector to diff against after a mutation.
    pub fn capture_state_vector(&self) -> StateVector {
        self.doc.transact().state_vector()
    }

    /// Operations this catalog has beyond `state_vector`.
    pub fn diff_since(&self, state_vector: &StateVector) -> Vec<u8> {
        self.doc.transact().encode_state_as_update_v1(state_vector)
    }

    /// The whole catalog as one update.
    pub fn encode_snapshot(&self) -> Vec<u8> {
        self.diff_since(&StateVector::default())
    }

    /// All catalog entries, in catalog order.
    pub fn pages(&self) -> Vec<PageEntry> {
        let txn = self.doc.transact();
        match self.meta.get(&txn, PAGES_KEY) {
            Some(Out::YArray(pages)) => pages
                .iter(&txn)
                .filter_map(|entry| read_entry(&entry, &txn))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether an entry with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.pages().iter().any(|page| page.id == id)
    }

    /// Add `entry`, or update the existing entry with the same id.
    pub fn upsert_page(&self, entry: &PageEntry) {
        let mut txn = self.doc.transact_mut();
        let pages = pages_array(&self.meta, &mut txn);

        let existing = pages
            .iter(&txn)
            .position(|item| read_entry(&item, &txn).is_some_and(|p| p.id == entry.id));
        if let Some(position) = existing
            && let Some(Out::YMap(map)) = pages.get(&txn, position as u32)
        {
            write_entry(&map, &mut txn, entry);
            return;
        }
        if let Some(position) = existing {
            pages.remove(&mut txn, position as u32);
        }
        let map = pages.push_back(&mut txn, MapPrelim::default());
        write_entry(&map, &mut txn, entry);
    }

    /// Remove every entry for `id`. Returns whether anything was removed.
    pub fn remove_page(&self, id: &str) -> bool {
        let mut txn = self.doc.transact_mut();
        let Some(Out::YArray(pages)) = self.meta.get(&txn, PAGES_KEY) else {
            return false;
        };
        let positions: Vec<u32> = pages
            .iter(&txn)
            .enumerate()
            .filter(|(_, item)| read_entry(item, &txn).is_some_and(|p| p.id == id))
            .map(|(i, _)| i as u32)
            .collect();
        for position in positions.iter().rev() {
            pages.remove(&mut txn, *position);
        }
        !positions.is_empty()
    }
}

impl Default for WorkspaceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkspaceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceIndex")
            .field("pages", &self.pages().len())
            .finish()
    }
}

fn pages_array(meta: &MapRef, txn: &mut TransactionMut) -> ArrayRef {
    match meta.get(&*txn, PAGES_KEY) {
        Some(Out::YArray(pages)) => pages,
        _ => meta.insert(txn, PAGES_KEY, ArrayPrelim::default()),
    }
}

fn write_entry(map: &MapRef, txn: &mut TransactionMut, entry: &PageEntry) {
    map.insert(txn, "id", entry.id.as_str());
    map.insert(txn, "title", entry.title.as_str());
    map.insert(txn, "createDate", Any::Number(entry.create_date as f64));
    let tags = map.insert(txn, "tags", ArrayPrelim::default());
    for tag in &entry.tags {
        tags.push_back(txn, tag.as_str());
    }
}

/// Read an entry stored either as a shared map or as a plain JSON object.
fn read_entry<T: ReadTxn>(value: &Out, txn: &T) -> Option<PageEntry> {
    match value {
        Out::YMap(map) => {
            let id = map.get(txn, "id").and_then(|v| out_to_string(&v, txn))?;
            Some(PageEntry {
                id,
                title: map
                    .get(txn, "title")
                    .and_then(|v| out_to_string(&v, txn))
                    .unwrap_or_default(),
                create_date: map
                    .get(txn, "createDate")
                    .and_then(|v| out_to_number(&v))
                    .unwrap_or_default() as i64,
                tags: map
                    .get(txn, "tags")
                    .map(|v| out_to_strings(&v, txn))
                    .unwrap_or_default(),
            })
        }
        Out::Any(any @ Any::Map(_)) => serde_json::from_value(any_to_json(any)).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str) -> PageEntry {
        PageEntry {
            id: id.into(),
            title: title.into(),
            create_date: 1_700_000_000_000,
            tags: vec!["work".into()],
        }
    }

    #[test]
    fn test_add_and_list() {
        let index = WorkspaceIndex::new();
        assert!(index.pages().is_empty());
        index.upsert_page(&entry("a", "Alpha"));
        index.upsert_page(&entry("b", "Beta"));
        assert_eq!(index.pages(), vec![entry("a", "Alpha"), entry("b", "Beta")]);
        assert!(index.contains("b"));
    }

    #[test]
    fn test_upsert_replaces_existing_entry() {
        let index = WorkspaceIndex::new();
        index.upsert_page(&entry("a", "Alpha"));
        index.upsert_page(&entry("a", "Renamed"));
        assert_eq!(index.pages(), vec![entry("a", "Renamed")]);
    }

    #[test]
    fn test_remove_reports_change() {
        let index = WorkspaceIndex::new();
        index.upsert_page(&entry("a", "Alpha"));
        index.upsert_page(&entry("b", "Beta"));
        assert!(index.remove_page("a"));
        assert!(!index.remove_page("a"));
        assert_eq!(index.pages(), vec![entry("b", "Beta")]);
    }

    #[test]
    fn test_delta_replays_on_remote_copy() {
        let local = WorkspaceIndex::new();
        local.upsert_page(&entry("a", "Alpha"));
        let remote = WorkspaceIndex::from_snapshot(&local.encode_snapshot()).unwrap();

        let sv = local.capture_state_vector();
        local.upsert_page(&entry("b", "Beta"));
        remote.load(&local.diff_since(&sv)).unwrap();
        assert_eq!(remote.pages(), local.pages());

        let sv = local.capture_state_vector();
        local.remove_page("a");
        remote.load(&local.diff_since(&sv)).unwrap();
        assert_eq!(remote.pages(), vec![entry("b", "Beta")]);
    }

    #[test]
    fn test_plain_object_entries_are_read() {
        let index = WorkspaceIndex::new();
        {
            let mut txn = index.doc.transact_mut();
            let pages = pages_array(&index.meta, &mut txn);
            let mut legacy = std::collections::HashMap::new();
            legacy.insert("id".to_string(), Any::from("old"));
            legacy.insert("title".to_string(), Any::from("Old page"));
            legacy.insert("createDate".to_string(), Any::Number(5.0));
            pages.push_back(&mut txn, Any::Map(std::sync::Arc::new(legacy)));
        }
        let pages = index.pages();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, "old");
        assert_eq!(pages[0].create_date, 5);
        assert!(index.remove_page("old"));
    }
}
