//! Read-only navigation over a document's block tree.
//!
//! A [`BlockTree`] is an owned snapshot of the `blocks` map: enough to
//! find blocks by id or flavour, compute sibling positions and collect
//! text. Child lists are kept exactly as stored so both historical child
//! encodings stay visible here and nowhere else.

use indexmap::{IndexMap, IndexSet};

use crate::schema::BlockKind;

/// One entry of a stored `sys:children` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEntry {
    /// Bare id, as written today.
    Id(String),
    /// One-element array wrapping an id, as written by older clients.
    Wrapped(String),
}

impl ChildEntry {
    /// The referenced block id.
    pub fn id(&self) -> &str {
        match self {
            ChildEntry::Id(id) | ChildEntry::Wrapped(id) => id,
        }
    }
}

/// Snapshot of one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockEntry {
    /// `sys:id`.
    pub id: String,
    /// `sys:flavour`.
    pub flavour: String,
    /// `prop:type`, for flavours that carry one.
    pub block_type: Option<String>,
    /// `sys:parent`, when stored.
    pub parent: Option<String>,
    /// `sys:children`, in stored order and encoding.
    pub children: Vec<ChildEntry>,
    /// `prop:text` as a plain string.
    pub text: Option<String>,
}

impl BlockEntry {
    /// Kind derived from the flavour and `prop:type`.
    pub fn kind(&self) -> Option<BlockKind> {
        BlockKind::from_stored(&self.flavour, self.block_type.as_deref())
    }

    /// Child ids in order, whatever their stored encoding.
    pub fn child_ids(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(ChildEntry::id)
    }
}

/// Snapshot of a document's blocks, in stored map order.
#[derive(Debug, Clone, Default)]
pub struct BlockTree {
    blocks: IndexMap<String, BlockEntry>,
}

impl BlockTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a block, keyed by its id.
    pub fn insert(&mut self, entry: BlockEntry) {
        self.blocks.insert(entry.id.clone(), entry);
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the tree holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block with `id`.
    pub fn get(&self, id: &str) -> Option<&BlockEntry> {
        self.blocks.get(id)
    }

    /// All blocks, in stored map order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockEntry> {
        self.blocks.values()
    }

    /// The root page block.
    pub fn page(&self) -> Option<&BlockEntry> {
        self.blocks
            .values()
            .find(|b| b.flavour == BlockKind::Page.flavour())
    }

    /// First block with `flavour`, in reading order from the page.
    ///
    /// Falls back to map order for blocks not reachable from the page.
    pub fn find_first_by_flavour(&self, flavour: &str) -> Option<&BlockEntry> {
        if let Some(page) = self.page() {
            let found = self
                .walk(&page.id)
                .into_iter()
                .filter_map(|id| self.get(id))
                .find(|b| b.flavour == flavour);
            if found.is_some() {
                return found;
            }
        }
        self.blocks.values().find(|b| b.flavour == flavour)
    }

    /// First block of `kind`.
    pub fn find_first_by_kind(&self, kind: BlockKind) -> Option<&BlockEntry> {
        self.find_first_by_flavour(kind.flavour())
    }

    /// Parent of `id`: the stored `sys:parent`, else whichever block lists
    /// `id` among its children.
    pub fn parent_of(&self, id: &str) -> Option<&BlockEntry> {
        let entry = self.get(id)?;
        if let Some(parent) = entry.parent.as_deref().and_then(|p| self.get(p)) {
            return Some(parent);
        }
        self.blocks
            .values()
            .find(|b| b.child_ids().any(|child| child == id))
    }

    /// Position of `child` within `parent`'s children.
    pub fn child_index(&self, parent: &str, child: &str) -> Option<usize> {
        self.get(parent)?.child_ids().position(|id| id == child)
    }

    /// Number of children of `parent` (zero when unknown).
    pub fn child_count(&self, parent: &str) -> usize {
        self.get(parent).map_or(0, |b| b.children.len())
    }

    /// Ids of `root` and all its descendants, depth first.
    ///
    /// Dangling child ids are skipped; a block reached twice is only
    /// visited once.
    pub fn walk<'a>(&'a self, root: &'a str) -> Vec<&'a str> {
        let mut visited = IndexSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if visited.contains(&id) {
                continue;
            }
            let Some(entry) = self.get(id) else {
                continue;
            };
            visited.insert(entry.id.as_str());
            let children: Vec<&str> = entry.child_ids().collect();
            stack.extend(children.into_iter().rev());
        }
        visited.into_iter().collect()
    }

    /// Text of every descendant of `root` (itself included), in reading
    /// order, skipping blocks without text.
    pub fn descendant_text(&self, root: &str) -> Vec<&str> {
        self.walk(root)
            .into_iter()
            .filter_map(|id| self.get(id)?.text.as_deref())
            .filter(|text| !text.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, flavour: &str, parent: Option<&str>, children: Vec<ChildEntry>) -> BlockEntry {
        BlockEntry {
            id: id.into(),
            flavour: flavour.into(),
            parent: parent.map(Into::into),
            children,
            ..Default::default()
        }
    }

    fn sample() -> BlockTree {
        let mut tree = BlockTree::new();
        // Surface listed before the page on purpose: lookups must not rely on map order.
        tree.insert(entry("surface", "affine:surface", Some("page"), vec![]));
        tree.insert(entry(
            "page",
            "affine:page",
            None,
            vec![
                ChildEntry::Id("surface".into()),
                ChildEntry::Wrapped("note".into()),
            ],
        ));
        tree.insert(entry(
            "note",
            "affine:note",
            Some("page"),
            vec![ChildEntry::Id("p1".into()), ChildEntry::Wrapped("p2".into())],
        ));
        let mut p1 = entry("p1", "affine:paragraph", Some("note"), vec![]);
        p1.text = Some("first".into());
        tree.insert(p1);
        // Legacy block without sys:parent.
        let mut p2 = entry("p2", "affine:paragraph", None, vec![]);
        p2.text = Some("second".into());
        tree.insert(p2);
        tree
    }

    #[test]
    fn test_find_by_kind() {
        let tree = sample();
        assert_eq!(tree.page().unwrap().id, "page");
        assert_eq!(tree.find_first_by_kind(BlockKind::Note).unwrap().id, "note");
        assert_eq!(tree.find_first_by_kind(BlockKind::Surface).unwrap().id, "surface");
        assert!(tree.find_first_by_kind(BlockKind::Code).is_none());
    }

    #[test]
    fn test_child_index_accepts_both_encodings() {
        let tree = sample();
        assert_eq!(tree.child_index("page", "surface"), Some(0));
        assert_eq!(tree.child_index("page", "note"), Some(1));
        assert_eq!(tree.child_index("note", "p2"), Some(1));
        assert_eq!(tree.child_index("note", "missing"), None);
        assert_eq!(tree.child_count("note"), 2);
    }

    #[test]
    fn test_parent_falls_back_to_child_scan() {
        let tree = sample();
        assert_eq!(tree.parent_of("p1").unwrap().id, "note");
        assert_eq!(tree.parent_of("p2").unwrap().id, "note");
        assert!(tree.parent_of("page").is_none());
    }

    #[test]
    fn test_walk_and_text() {
        let tree = sample();
        assert_eq!(tree.walk("page"), vec!["page", "surface", "note", "p1", "p2"]);
        assert_eq!(tree.descendant_text("page"), vec!["first", "second"]);
    }

    #[test]
    fn test_walk_tolerates_cycles_and_dangling_children() {
        let mut tree = BlockTree::new();
        tree.insert(entry(
            "a",
            "affine:note",
            None,
            vec![ChildEntry::Id("b".into()), ChildEntry::Id("ghost".into())],
        ));
        tree.insert(entry("b", "affine:paragraph", Some("a"), vec![ChildEntry::Id("a".into())]));
        assert_eq!(tree.walk("a"), vec!["a", "b"]);
    }

    #[test]
    fn test_walk_wide_note() {
        let mut tree = BlockTree::new();
        let ids: Vec<String> = (0..20_000).map(|i| format!("p{i}")).collect();
        tree.insert(entry(
            "note",
            "affine:note",
            None,
            ids.iter().map(|id| ChildEntry::Id(id.clone())).collect(),
        ));
        for id in &ids {
            tree.insert(entry(id, "affine:paragraph", Some("note"), vec![]));
        }
        let walked = tree.walk("note");
        assert_eq!(walked.len(), 20_001);
        assert_eq!(walked.last(), Some(&"p19999"));
    }

    #[test]
    fn test_kind_recovery() {
        let mut heading = entry("h", "affine:paragraph", None, vec![]);
        heading.block_type = Some("h2".into());
        assert_eq!(heading.kind(), Some(BlockKind::Heading));
    }
}
