//! Block construction.
//!
//! [`build`] turns a validated [`BlockSpec`] into a [`Block`]: a fresh id,
//! the kind's flavour and version, an empty child list and the full
//! property set the kind needs. Nothing here touches a document; the
//! result is materialized by [`crate::doc::BlockDoc`].

use indexmap::IndexMap;

use crate::ids::IdGenerator;
use crate::schema::{BlockKind, BlockSpec, EmbedKind, Geometry, ListStyle};

/// Fractional index given to freshly created canvas elements.
const DEFAULT_CANVAS_INDEX: &str = "a0";

/// Surface element container marker.
const NATIVE_ELEMENTS_TYPE: &str = "$blocksuite:internal:native$";

/// A property value, before it is written into a document.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Collaborative text sequence.
    Text(String),
    /// Plain string scalar.
    Str(String),
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar.
    Number(f64),
    /// Explicit null.
    Null,
    /// Nested keyed mapping.
    Map(IndexMap<String, PropValue>),
    /// Nested ordered sequence.
    Array(Vec<PropValue>),
}

impl PropValue {
    /// Plain string value.
    pub fn str(value: impl Into<String>) -> Self {
        PropValue::Str(value.into())
    }

    /// Collaborative text value.
    pub fn text(value: impl Into<String>) -> Self {
        PropValue::Text(value.into())
    }

    /// Empty nested map.
    pub fn empty_map() -> Self {
        PropValue::Map(IndexMap::new())
    }
}

/// A block ready to be linked into a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Fresh identifier.
    pub id: String,
    /// Kind the block was built for.
    pub kind: BlockKind,
    /// Parent id; `None` only for the page.
    pub parent: Option<String>,
    /// Child ids, usually empty on creation.
    pub children: Vec<String>,
    /// Property values keyed without the `prop:` prefix.
    pub props: IndexMap<String, PropValue>,
}

impl Block {
    /// `sys:flavour` for the kind.
    pub fn flavour(&self) -> &'static str {
        self.kind.flavour()
    }

    /// `sys:version` for the kind.
    pub fn version(&self) -> u32 {
        self.kind.version()
    }

    /// Property by key, without the `prop:` prefix.
    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }
}

/// Build a block for `spec` under `parent_id`.
pub fn build(spec: &BlockSpec, parent_id: Option<&str>, ids: &mut IdGenerator) -> Block {
    let props = properties(spec, ids);
    Block {
        id: ids.next_id(),
        kind: spec.kind(),
        parent: parent_id.map(str::to_string),
        children: Vec::new(),
        props,
    }
}

fn properties(spec: &BlockSpec, ids: &mut IdGenerator) -> IndexMap<String, PropValue> {
    let mut props = Props::default();
    match spec {
        BlockSpec::Paragraph { text } => {
            props.str("type", "text").text("text", text);
        }
        BlockSpec::Heading { level, text } => {
            props.str("type", format!("h{level}")).text("text", text);
        }
        BlockSpec::Quote { text } => {
            props.str("type", "quote").text("text", text);
        }
        BlockSpec::List {
            style,
            checked,
            text,
        } => {
            props.str("type", style.as_str()).text("text", text);
            if *style == ListStyle::Todo {
                props.set("checked", PropValue::Bool(*checked));
            }
            props.set("collapsed", PropValue::Bool(false));
        }
        BlockSpec::Code {
            language,
            text,
            caption,
            wrap,
        } => {
            props
                .str("language", language)
                .text("text", text)
                .str("caption", caption)
                .set("wrap", PropValue::Bool(*wrap));
        }
        BlockSpec::Divider => {}
        BlockSpec::Callout { emoji, text } => {
            props.str("emoji", emoji).text("text", text);
        }
        BlockSpec::Latex { latex } => {
            props.str("latex", latex);
        }
        BlockSpec::Table { rows, columns } => table_props(&mut props, *rows, *columns, ids),
        BlockSpec::Bookmark {
            url,
            style,
            title,
            description,
            caption,
        } => {
            props
                .str("style", style.as_str())
                .str("url", url)
                .str("title", title)
                .str("description", description)
                .str("caption", caption)
                .set("icon", PropValue::Null)
                .set("image", PropValue::Null);
        }
        BlockSpec::Image {
            source_id,
            caption,
            width,
            height,
        } => {
            props
                .str("sourceId", source_id)
                .str("caption", caption)
                .set("width", PropValue::Number(*width))
                .set("height", PropValue::Number(*height))
                .set("rotate", PropValue::Number(0.0));
        }
        BlockSpec::Attachment {
            source_id,
            name,
            mime_type,
            size,
            embed,
            caption,
        } => {
            props
                .str("sourceId", source_id)
                .str("name", name)
                .str("type", mime_type)
                .set("size", PropValue::Number(*size as f64))
                .set("embed", PropValue::Bool(*embed))
                .str("caption", caption)
                .str("style", "horizontal");
        }
        BlockSpec::Embed { kind, url, caption } => {
            props
                .str("url", url)
                .str("caption", caption)
                .str("style", kind.default_style());
            if *kind != EmbedKind::Iframe {
                props
                    .set("title", PropValue::Null)
                    .set("description", PropValue::Null);
            }
        }
        BlockSpec::EmbedHtml {
            html,
            design,
            caption,
        } => {
            props
                .str("html", html)
                .str("design", design)
                .str("caption", caption)
                .str("style", "html");
        }
        BlockSpec::EmbedLinkedDoc { page_id, caption } => {
            props
                .str("pageId", page_id)
                .str("caption", caption)
                .str("style", "horizontal");
        }
        BlockSpec::EmbedSyncedDoc { page_id } => {
            props.str("pageId", page_id).str("style", "syncedDoc");
        }
        BlockSpec::Database { title } | BlockSpec::DataView { title } => {
            props
                .set("views", PropValue::Array(Vec::new()))
                .text("title", title)
                .set("cells", PropValue::empty_map())
                .set("columns", PropValue::Array(Vec::new()));
        }
        BlockSpec::SurfaceRef {
            reference,
            ref_flavour,
            caption,
        } => {
            props
                .str("reference", reference)
                .str("refFlavour", ref_flavour)
                .str("caption", caption);
        }
        BlockSpec::Frame {
            title,
            geometry,
            background,
        } => {
            props
                .text("title", title)
                .str("background", background)
                .str("xywh", xywh(*geometry))
                .str("index", DEFAULT_CANVAS_INDEX)
                .set("childElementIds", PropValue::empty_map());
        }
        BlockSpec::EdgelessText { geometry } => {
            props
                .str("xywh", xywh(*geometry))
                .str("index", DEFAULT_CANVAS_INDEX)
                .str("color", "black")
                .str("textAlign", "left")
                .set("hasMaxWidth", PropValue::Bool(false))
                .set("scale", PropValue::Number(1.0));
        }
        BlockSpec::Note {
            geometry,
            background,
        } => {
            props
                .str("xywh", xywh(*geometry))
                .str("background", background)
                .str("index", DEFAULT_CANVAS_INDEX)
                .set("hidden", PropValue::Bool(false))
                .str("displayMode", "both")
                .set("edgeless", note_edgeless_style());
        }
        BlockSpec::Page { title } => {
            props.text("title", title);
        }
        BlockSpec::Surface => {
            let mut elements = IndexMap::new();
            elements.insert("type".to_string(), PropValue::str(NATIVE_ELEMENTS_TYPE));
            elements.insert("value".to_string(), PropValue::empty_map());
            props.set("elements", PropValue::Map(elements));
        }
    }
    props.0
}

/// Rows, columns and cells, keyed by generated ids and ordered by
/// fixed-width position keys so lexicographic order matches insertion order.
fn table_props(props: &mut Props, rows: u32, columns: u32, ids: &mut IdGenerator) {
    let row_ids: Vec<String> = (0..rows).map(|_| ids.next_id()).collect();
    let column_ids: Vec<String> = (0..columns).map(|_| ids.next_id()).collect();

    let mut row_map = IndexMap::new();
    for (i, row_id) in row_ids.iter().enumerate() {
        let mut row = IndexMap::new();
        row.insert("rowId".to_string(), PropValue::str(row_id));
        row.insert("order".to_string(), PropValue::str(position_key('r', i)));
        row_map.insert(row_id.clone(), PropValue::Map(row));
    }

    let mut column_map = IndexMap::new();
    for (i, column_id) in column_ids.iter().enumerate() {
        let mut column = IndexMap::new();
        column.insert("columnId".to_string(), PropValue::str(column_id));
        column.insert("order".to_string(), PropValue::str(position_key('c', i)));
        column_map.insert(column_id.clone(), PropValue::Map(column));
    }

    let mut cells = IndexMap::new();
    for row_id in &row_ids {
        for column_id in &column_ids {
            let mut cell = IndexMap::new();
            cell.insert("text".to_string(), PropValue::text(""));
            cells.insert(format!("{row_id}:{column_id}"), PropValue::Map(cell));
        }
    }

    props
        .set("rows", PropValue::Map(row_map))
        .set("columns", PropValue::Map(column_map))
        .set("cells", PropValue::Map(cells));
}

/// `r0000`, `r0001`, …
pub fn position_key(prefix: char, position: usize) -> String {
    format!("{prefix}{position:04}")
}

fn xywh(geometry: Geometry) -> String {
    format!("[0,0,{},{}]", geometry.width, geometry.height)
}

fn note_edgeless_style() -> PropValue {
    let mut style = IndexMap::new();
    style.insert("borderRadius".to_string(), PropValue::Number(8.0));
    style.insert("borderSize".to_string(), PropValue::Number(4.0));
    style.insert("borderStyle".to_string(), PropValue::str("none"));
    style.insert(
        "shadowType".to_string(),
        PropValue::str("--affine-note-shadow-box"),
    );
    let mut edgeless = IndexMap::new();
    edgeless.insert("style".to_string(), PropValue::Map(style));
    PropValue::Map(edgeless)
}

#[derive(Default)]
struct Props(IndexMap<String, PropValue>);

impl Props {
    fn set(&mut self, key: &str, value: PropValue) -> &mut Self {
        self.0.insert(key.to_string(), value);
        self
    }

    fn str(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.set(key, PropValue::Str(value.into()))
    }

    fn text(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.set(key, PropValue::Text(value.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BookmarkStyle;

    fn ids() -> IdGenerator {
        IdGenerator::seeded(42)
    }

    #[test]
    fn test_heading_uses_paragraph_flavour() {
        let block = build(
            &BlockSpec::Heading {
                level: 2,
                text: "Intro".into(),
            },
            Some("note"),
            &mut ids(),
        );
        assert_eq!(block.flavour(), "affine:paragraph");
        assert_eq!(block.version(), 1);
        assert_eq!(block.parent.as_deref(), Some("note"));
        assert!(block.children.is_empty());
        assert_eq!(block.prop("type"), Some(&PropValue::str("h2")));
        assert_eq!(block.prop("text"), Some(&PropValue::text("Intro")));
    }

    #[test]
    fn test_checked_only_on_todo_lists() {
        let todo = build(
            &BlockSpec::List {
                style: ListStyle::Todo,
                checked: true,
                text: "ship".into(),
            },
            None,
            &mut ids(),
        );
        assert_eq!(todo.prop("checked"), Some(&PropValue::Bool(true)));

        let bulleted = build(
            &BlockSpec::List {
                style: ListStyle::Bulleted,
                checked: false,
                text: String::new(),
            },
            None,
            &mut ids(),
        );
        assert_eq!(bulleted.prop("checked"), None);
        assert_eq!(bulleted.prop("type"), Some(&PropValue::str("bulleted")));
    }

    #[test]
    fn test_table_position_keys() {
        let block = build(
            &BlockSpec::Table {
                rows: 2,
                columns: 3,
            },
            None,
            &mut ids(),
        );
        let Some(PropValue::Map(rows)) = block.prop("rows") else {
            panic!("rows missing");
        };
        let orders: Vec<_> = rows
            .values()
            .map(|row| match row {
                PropValue::Map(row) => row["order"].clone(),
                other => panic!("unexpected row {other:?}"),
            })
            .collect();
        assert_eq!(orders, vec![PropValue::str("r0000"), PropValue::str("r0001")]);

        let Some(PropValue::Map(columns)) = block.prop("columns") else {
            panic!("columns missing");
        };
        assert_eq!(columns.len(), 3);

        let Some(PropValue::Map(cells)) = block.prop("cells") else {
            panic!("cells missing");
        };
        assert_eq!(cells.len(), 6);
        let first_row = rows.keys().next().unwrap();
        let first_column = columns.keys().next().unwrap();
        assert!(cells.contains_key(&format!("{first_row}:{first_column}")));
    }

    #[test]
    fn test_database_starts_empty() {
        let block = build(
            &BlockSpec::DataView {
                title: "Tasks".into(),
            },
            None,
            &mut ids(),
        );
        assert_eq!(block.flavour(), "affine:database");
        assert_eq!(block.kind, BlockKind::DataView);
        assert_eq!(block.prop("views"), Some(&PropValue::Array(vec![])));
        assert_eq!(block.prop("columns"), Some(&PropValue::Array(vec![])));
        assert_eq!(block.prop("cells"), Some(&PropValue::empty_map()));
        assert_eq!(block.prop("title"), Some(&PropValue::text("Tasks")));
    }

    #[test]
    fn test_canvas_geometry() {
        let block = build(
            &BlockSpec::Note {
                geometry: Geometry {
                    width: 480.0,
                    height: 92.5,
                },
                background: "--bg".into(),
            },
            Some("page"),
            &mut ids(),
        );
        assert_eq!(block.prop("xywh"), Some(&PropValue::str("[0,0,480,92.5]")));
        assert_eq!(block.prop("displayMode"), Some(&PropValue::str("both")));
    }

    #[test]
    fn test_root_versions() {
        let page = build(&BlockSpec::Page { title: "Demo".into() }, None, &mut ids());
        assert_eq!(page.version(), 2);
        assert_eq!(page.parent, None);

        let surface = build(&BlockSpec::Surface, Some(&page.id), &mut ids());
        assert_eq!(surface.version(), 5);
        assert!(matches!(surface.prop("elements"), Some(PropValue::Map(_))));
    }

    #[test]
    fn test_bookmark_props() {
        let block = build(
            &BlockSpec::Bookmark {
                url: "https://example.com".into(),
                style: BookmarkStyle::Citation,
                title: String::new(),
                description: String::new(),
                caption: String::new(),
            },
            None,
            &mut ids(),
        );
        assert_eq!(block.prop("style"), Some(&PropValue::str("citation")));
        assert_eq!(block.prop("url"), Some(&PropValue::str("https://example.com")));
    }

    #[test]
    fn test_ids_are_fresh() {
        let mut ids = ids();
        let a = build(&BlockSpec::Divider, None, &mut ids);
        let b = build(&BlockSpec::Divider, None, &mut ids);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_position_key_width() {
        assert_eq!(position_key('c', 0), "c0000");
        assert_eq!(position_key('r', 19), "r0019");
    }
}
