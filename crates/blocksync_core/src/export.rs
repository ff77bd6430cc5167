//! Read view of a page document and its Markdown flattening.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;

use crate::doc::BlockDoc;
use crate::schema::{BlockKind, heading_level};
use crate::tree::BlockTree;

/// A document as handed to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    /// Document id from the metadata.
    pub id: String,
    /// Document title.
    pub title: String,
    /// Document tags.
    pub tags: Vec<String>,
    /// Milliseconds since the Unix epoch.
    pub create_date: i64,
    /// The page block, or `None` for a document without one.
    pub root: Option<BlockNode>,
}

/// One block with its children, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNode {
    /// `sys:id`.
    pub id: String,
    /// `sys:flavour`.
    pub flavour: String,
    /// Canonical kind name, or the flavour for unknown blocks.
    pub normalized_type: String,
    /// `prop:text` as a plain string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Remaining `prop:*` values, without the prefix.
    pub props: IndexMap<String, Value>,
    /// Child blocks, in order.
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    /// Kind derived from the flavour and the `type` property.
    pub fn kind(&self) -> Option<BlockKind> {
        let block_type = self.props.get("type").and_then(Value::as_str);
        BlockKind::from_stored(&self.flavour, block_type)
    }

    fn prop_str(&self, key: &str) -> &str {
        self.props.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Depth-first iterator over this node and its descendants.
    pub fn descendants(&self) -> Vec<&BlockNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.descendants());
        }
        out
    }
}

impl DocumentView {
    /// Build the view from a loaded document.
    pub fn from_doc(doc: &BlockDoc) -> Self {
        let meta = doc.meta();
        let tree = doc.block_tree();
        let mut visited = IndexSet::new();
        let root = tree
            .page()
            .map(|page| build_node(doc, &tree, &page.id, &mut visited));
        Self {
            id: meta.id,
            title: meta.title,
            tags: meta.tags,
            create_date: meta.create_date,
            root,
        }
    }

    /// All blocks of a flavour-derived kind, in reading order.
    pub fn blocks_of(&self, kind: BlockKind) -> Vec<&BlockNode> {
        self.root
            .as_ref()
            .map(|root| {
                root.descendants()
                    .into_iter()
                    .filter(|node| node.kind() == Some(kind))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Flatten the linear content into Markdown.
    ///
    /// Canvas content under the surface is left out.
    pub fn to_markdown(&self) -> String {
        let mut chunks = Vec::new();
        if !self.title.is_empty() {
            chunks.push(format!("# {}", self.title));
        }
        if let Some(root) = &self.root {
            for child in &root.children {
                render(child, 0, &mut chunks);
            }
        }
        let mut out = chunks.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

fn build_node(
    doc: &BlockDoc,
    tree: &BlockTree,
    id: &str,
    visited: &mut IndexSet<String>,
) -> BlockNode {
    visited.insert(id.to_string());
    let entry = tree.get(id).cloned().unwrap_or_default();
    let mut props = doc.block_props(id).unwrap_or_default();
    let text = props.shift_remove("text").and_then(|value| match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    });

    let mut children = Vec::new();
    for child in entry.child_ids() {
        if tree.get(child).is_none() {
            continue;
        }
        if visited.contains(child) {
            log::warn!("Block {child} is also listed under {id}; showing it only once");
            continue;
        }
        children.push(build_node(doc, tree, child, visited));
    }

    BlockNode {
        normalized_type: entry
            .kind()
            .map_or_else(|| entry.flavour.clone(), |kind| kind.name().to_string()),
        id: entry.id,
        flavour: entry.flavour,
        text,
        props,
        children,
    }
}

fn render(node: &BlockNode, depth: usize, out: &mut Vec<String>) {
    let text = node.text.as_deref().unwrap_or("");
    let indent = "  ".repeat(depth);
    let line = match node.kind() {
        Some(BlockKind::Surface) => return,
        Some(BlockKind::Note) => {
            for child in &node.children {
                render(child, depth, out);
            }
            return;
        }
        Some(BlockKind::Paragraph) => text.to_string(),
        Some(BlockKind::Heading) => {
            let level = heading_level(node.prop_str("type")).unwrap_or(1);
            format!("{} {text}", "#".repeat(usize::from(level)))
        }
        Some(BlockKind::Quote) => quote(text),
        Some(BlockKind::List) => {
            let marker = match node.prop_str("type") {
                "numbered" => "1.".to_string(),
                "todo" => {
                    let checked = node.props.get("checked").and_then(Value::as_bool);
                    if checked == Some(true) {
                        "- [x]".to_string()
                    } else {
                        "- [ ]".to_string()
                    }
                }
                _ => "-".to_string(),
            };
            let mut item = format!("{indent}{marker} {text}");
            let mut nested = Vec::new();
            for child in &node.children {
                render(child, depth + 1, &mut nested);
            }
            for chunk in nested {
                item.push('\n');
                item.push_str(&chunk);
            }
            out.push(item);
            return;
        }
        Some(BlockKind::Code) => {
            let language = node.prop_str("language");
            let language = if language == "txt" { "" } else { language };
            format!("```{language}\n{text}\n```")
        }
        Some(BlockKind::Divider) => "---".to_string(),
        Some(BlockKind::Callout) => quote(&format!("{} {text}", node.prop_str("emoji"))),
        Some(BlockKind::Latex) => format!("$$\n{}\n$$", node.prop_str("latex")),
        Some(BlockKind::Bookmark)
        | Some(BlockKind::EmbedYoutube)
        | Some(BlockKind::EmbedGithub)
        | Some(BlockKind::EmbedFigma)
        | Some(BlockKind::EmbedLoom)
        | Some(BlockKind::EmbedIframe) => {
            let url = node.prop_str("url");
            let label = match node.prop_str("title") {
                "" => url,
                title => title,
            };
            format!("[{label}]({url})")
        }
        Some(BlockKind::Image) => {
            format!("![{}](blob:{})", node.prop_str("caption"), node.prop_str("sourceId"))
        }
        Some(BlockKind::Attachment) => {
            format!("[{}](blob:{})", node.prop_str("name"), node.prop_str("sourceId"))
        }
        Some(BlockKind::Database) | Some(BlockKind::DataView) => {
            let title = node
                .props
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("");
            if title.is_empty() {
                return;
            }
            format!("**{title}**")
        }
        _ => text.to_string(),
    };

    if line.is_empty() {
        return;
    }
    if depth > 0 {
        out.push(indent_lines(&line, &indent));
    } else {
        out.push(line);
    }
    for child in &node.children {
        render(child, depth + 1, out);
    }
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_lines(text: &str, indent: &str) -> String {
    text.lines()
        .map(|line| format!("{indent}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{DocMeta, Insertion};
    use crate::factory::build;
    use crate::ids::IdGenerator;
    use crate::schema::{BlockSpec, ListStyle};

    fn sample() -> BlockDoc {
        let mut ids = IdGenerator::seeded(7);
        let doc = BlockDoc::new();
        let page = build(
            &BlockSpec::Page {
                title: "Demo".into(),
            },
            None,
            &mut ids,
        );
        let surface = build(&BlockSpec::Surface, Some(&page.id), &mut ids);
        let note = build(&BlockSpec::default_note(), Some(&page.id), &mut ids);
        let heading = build(
            &BlockSpec::Heading {
                level: 2,
                text: "Intro".into(),
            },
            Some(&note.id),
            &mut ids,
        );
        let todo = build(
            &BlockSpec::List {
                style: ListStyle::Todo,
                checked: true,
                text: "ship".into(),
            },
            Some(&note.id),
            &mut ids,
        );
        let code = build(
            &BlockSpec::Code {
                language: "python".into(),
                text: "print(1)".into(),
                caption: String::new(),
                wrap: false,
            },
            Some(&note.id),
            &mut ids,
        );
        let divider = build(&BlockSpec::Divider, Some(&note.id), &mut ids);
        doc.insert_blocks(&[
            Insertion::append(page),
            Insertion::append(surface),
            Insertion::append(note),
            Insertion::append(heading),
            Insertion::append(todo),
            Insertion::append(code),
            Insertion::append(divider),
        ])
        .unwrap();
        doc.set_meta(&DocMeta {
            id: "doc-1".into(),
            title: "Demo".into(),
            create_date: 1_700_000_000_000,
            tags: vec!["a".into()],
        });
        doc
    }

    #[test]
    fn test_view_mirrors_tree() {
        let view = DocumentView::from_doc(&sample());
        assert_eq!(view.id, "doc-1");
        assert_eq!(view.title, "Demo");
        assert_eq!(view.tags, vec!["a".to_string()]);

        let root = view.root.as_ref().unwrap();
        assert_eq!(root.normalized_type, "page");
        let kinds: Vec<&str> = root
            .children
            .iter()
            .map(|c| c.normalized_type.as_str())
            .collect();
        assert_eq!(kinds, vec!["surface", "note"]);

        let code = view.blocks_of(BlockKind::Code);
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].text.as_deref(), Some("print(1)"));
        assert_eq!(code[0].props["language"], "python");
        assert!(!code[0].props.contains_key("text"));
    }

    #[test]
    fn test_markdown() {
        let markdown = DocumentView::from_doc(&sample()).to_markdown();
        assert_eq!(
            markdown,
            "# Demo\n\n## Intro\n\n- [x] ship\n\n```python\nprint(1)\n```\n\n---\n"
        );
    }

    #[test]
    fn test_shared_child_is_rendered_once() {
        let mut ids = IdGenerator::seeded(11);
        let doc = BlockDoc::new();
        let page = build(&BlockSpec::Page { title: "T".into() }, None, &mut ids);
        let first = build(&BlockSpec::default_note(), Some(&page.id), &mut ids);
        let shared = build(
            &BlockSpec::Paragraph {
                text: "shared".into(),
            },
            Some(&first.id),
            &mut ids,
        );
        let mut second = build(&BlockSpec::default_note(), Some(&page.id), &mut ids);
        second.children.push(shared.id.clone());
        doc.insert_blocks(&[
            Insertion::append(page),
            Insertion::append(first),
            Insertion::append(shared),
            Insertion::append(second),
        ])
        .unwrap();
        doc.set_meta(&DocMeta {
            id: "d".into(),
            title: "T".into(),
            create_date: 0,
            tags: vec![],
        });

        let view = DocumentView::from_doc(&doc);
        let notes = &view.root.as_ref().unwrap().children;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].children.len(), 1);
        assert!(notes[1].children.is_empty());
        assert_eq!(view.to_markdown(), "# T\n\nshared\n");
    }

    #[test]
    fn test_empty_document() {
        let view = DocumentView::from_doc(&BlockDoc::new());
        assert!(view.root.is_none());
        assert_eq!(view.to_markdown(), "");
    }
}
