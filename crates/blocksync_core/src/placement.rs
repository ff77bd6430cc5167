//! Placement resolution.
//!
//! [`resolve`] decides where a new block goes before anything is built, so
//! a failed resolution leaves the document untouched. Containers that do
//! not exist yet are reported as [`ParentTarget::NewNote`] or
//! [`ParentTarget::NewSurface`] and created by the caller in the same
//! transaction as the block itself.

use crate::error::ValidationError;
use crate::schema::{BlockKind, NormalizedRequest, Placement};
use crate::tree::BlockTree;

/// Parent the new block will be linked under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentTarget {
    /// A block already in the document.
    Existing(String),
    /// The document has no note yet; create one under the page.
    NewNote,
    /// The document has no surface yet; create one under the page.
    NewSurface,
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlacement {
    /// Where to link the block.
    pub parent: ParentTarget,
    /// Position in the parent's children.
    pub index: usize,
    /// Root page, parent of any container that has to be created.
    pub page_id: String,
}

/// Resolve the parent and insertion index for `request` in `tree`.
pub fn resolve(
    tree: &BlockTree,
    request: &NormalizedRequest,
) -> Result<ResolvedPlacement, ValidationError> {
    let kind = request.kind();
    let page_id = tree
        .page()
        .map(|page| page.id.clone())
        .ok_or_else(|| ValidationError::MissingRootBlock(BlockKind::Page.name().to_string()))?;

    let (parent, index) = match &request.placement {
        Placement::After(reference) | Placement::Before(reference) => {
            let after = matches!(request.placement, Placement::After(_));
            let (parent, position) = sibling_position(tree, reference)?;
            (ParentTarget::Existing(parent), position + usize::from(after))
        }
        Placement::Within {
            parent_id: Some(parent_id),
            index,
        } => {
            if tree.get(parent_id).is_none() {
                return Err(ValidationError::BlockNotFound(parent_id.clone()));
            }
            let len = tree.child_count(parent_id);
            let index = clamp_index(parent_id, *index, len, request.strict)?;
            (ParentTarget::Existing(parent_id.clone()), index)
        }
        Placement::Within {
            parent_id: None,
            index,
        } => {
            let parent = implicit_parent(tree, kind, &page_id);
            let (label, len) = match &parent {
                ParentTarget::Existing(id) => (id.as_str(), tree.child_count(id)),
                ParentTarget::NewNote => (BlockKind::Note.name(), 0),
                ParentTarget::NewSurface => (BlockKind::Surface.name(), 0),
            };
            let index = clamp_index(label, *index, len, request.strict)?;
            (parent, index)
        }
    };

    if request.strict {
        check_containment(tree, kind, &parent)?;
    }

    Ok(ResolvedPlacement {
        parent,
        index,
        page_id,
    })
}

/// Parent of `reference` and its position there.
fn sibling_position(tree: &BlockTree, reference: &str) -> Result<(String, usize), ValidationError> {
    if tree.get(reference).is_none() {
        return Err(ValidationError::BlockNotFound(reference.to_string()));
    }
    let parent = tree
        .parent_of(reference)
        .ok_or_else(|| ValidationError::MissingParent(reference.to_string()))?;
    let position = tree
        .child_index(&parent.id, reference)
        .ok_or_else(|| ValidationError::MissingParent(reference.to_string()))?;
    Ok((parent.id.clone(), position))
}

fn implicit_parent(tree: &BlockTree, kind: BlockKind, page_id: &str) -> ParentTarget {
    if kind.is_canvas() {
        return tree
            .find_first_by_kind(BlockKind::Surface)
            .map_or(ParentTarget::NewSurface, |s| {
                ParentTarget::Existing(s.id.clone())
            });
    }
    if kind == BlockKind::Note {
        return ParentTarget::Existing(page_id.to_string());
    }
    tree.find_first_by_kind(BlockKind::Note)
        .map_or(ParentTarget::NewNote, |n| ParentTarget::Existing(n.id.clone()))
}

/// An index equal to the child count appends. Beyond that, strict mode
/// fails and lenient mode appends.
fn clamp_index(
    parent: &str,
    index: Option<usize>,
    len: usize,
    strict: bool,
) -> Result<usize, ValidationError> {
    match index {
        None => Ok(len),
        Some(i) if i <= len => Ok(i),
        Some(i) if strict => Err(ValidationError::IndexOutOfRange {
            parent: parent.to_string(),
            index: i as i64,
            len,
        }),
        Some(_) => Ok(len),
    }
}

fn check_containment(
    tree: &BlockTree,
    child: BlockKind,
    parent: &ParentTarget,
) -> Result<(), ValidationError> {
    let (parent_kind, parent_label) = match parent {
        ParentTarget::Existing(id) => {
            let entry = tree
                .get(id)
                .ok_or_else(|| ValidationError::BlockNotFound(id.clone()))?;
            (entry.kind(), entry.flavour.clone())
        }
        ParentTarget::NewNote => (Some(BlockKind::Note), BlockKind::Note.flavour().to_string()),
        ParentTarget::NewSurface => (
            Some(BlockKind::Surface),
            BlockKind::Surface.flavour().to_string(),
        ),
    };

    let allowed = match parent_kind {
        Some(BlockKind::Page) => child == BlockKind::Note,
        Some(BlockKind::Surface) => child.is_canvas(),
        _ if child == BlockKind::Note => false,
        _ if child.is_canvas() => false,
        _ => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(ValidationError::InvalidContainment {
            child: child.name().to_string(),
            parent: parent_kind.map_or(parent_label, |k| k.name().to_string()),
        })
    }
}
