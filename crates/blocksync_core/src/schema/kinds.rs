//! Block kind registry.
//!
//! Maps canonical type names and legacy aliases to [`BlockKind`], and each
//! kind to its stored flavour, schema version and accepted request fields.

use std::fmt;

/// Schema version stored for `page` blocks.
const PAGE_VERSION: u32 = 2;
/// Schema version stored for `surface` blocks.
const SURFACE_VERSION: u32 = 5;

/// Canonical block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Plain text paragraph (`affine:paragraph`, type `text`).
    Paragraph,
    /// Heading, levels 1 to 6 (`affine:paragraph`, type `h1`..`h6`).
    Heading,
    /// Block quote (`affine:paragraph`, type `quote`).
    Quote,
    /// Bulleted, numbered or todo item (`affine:list`).
    List,
    /// Fenced code (`affine:code`).
    Code,
    /// Horizontal rule.
    Divider,
    /// Callout with an emoji.
    Callout,
    /// Display math.
    Latex,
    /// Table with pre-allocated rows and columns.
    Table,
    /// Link card.
    Bookmark,
    /// Image backed by an uploaded blob.
    Image,
    /// File attachment backed by an uploaded blob.
    Attachment,
    /// YouTube embed.
    EmbedYoutube,
    /// GitHub embed.
    EmbedGithub,
    /// Figma embed.
    EmbedFigma,
    /// Loom embed.
    EmbedLoom,
    /// Raw HTML or design payload embed.
    EmbedHtml,
    /// Card linking another page.
    EmbedLinkedDoc,
    /// Inline copy of another page.
    EmbedSyncedDoc,
    /// Generic iframe embed.
    EmbedIframe,
    /// Database with views, columns and cells.
    Database,
    /// Stored as a `database` block; see [`BlockKind::flavour`].
    DataView,
    /// Reference to a canvas element or frame.
    SurfaceRef,
    /// Canvas frame, child of the surface.
    Frame,
    /// Free text on the canvas, child of the surface.
    EdgelessText,
    /// Content container, child of the page.
    Note,
    /// Document root.
    Page,
    /// Canvas root.
    Surface,
}

impl BlockKind {
    /// Every canonical kind, in registry order.
    pub const ALL: [BlockKind; 28] = [
        BlockKind::Paragraph,
        BlockKind::Heading,
        BlockKind::Quote,
        BlockKind::List,
        BlockKind::Code,
        BlockKind::Divider,
        BlockKind::Callout,
        BlockKind::Latex,
        BlockKind::Table,
        BlockKind::Bookmark,
        BlockKind::Image,
        BlockKind::Attachment,
        BlockKind::EmbedYoutube,
        BlockKind::EmbedGithub,
        BlockKind::EmbedFigma,
        BlockKind::EmbedLoom,
        BlockKind::EmbedHtml,
        BlockKind::EmbedLinkedDoc,
        BlockKind::EmbedSyncedDoc,
        BlockKind::EmbedIframe,
        BlockKind::Database,
        BlockKind::DataView,
        BlockKind::SurfaceRef,
        BlockKind::Frame,
        BlockKind::EdgelessText,
        BlockKind::Note,
        BlockKind::Page,
        BlockKind::Surface,
    ];

    /// Canonical request name.
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading => "heading",
            BlockKind::Quote => "quote",
            BlockKind::List => "list",
            BlockKind::Code => "code",
            BlockKind::Divider => "divider",
            BlockKind::Callout => "callout",
            BlockKind::Latex => "latex",
            BlockKind::Table => "table",
            BlockKind::Bookmark => "bookmark",
            BlockKind::Image => "image",
            BlockKind::Attachment => "attachment",
            BlockKind::EmbedYoutube => "embed_youtube",
            BlockKind::EmbedGithub => "embed_github",
            BlockKind::EmbedFigma => "embed_figma",
            BlockKind::EmbedLoom => "embed_loom",
            BlockKind::EmbedHtml => "embed_html",
            BlockKind::EmbedLinkedDoc => "embed_linked_doc",
            BlockKind::EmbedSyncedDoc => "embed_synced_doc",
            BlockKind::EmbedIframe => "embed_iframe",
            BlockKind::Database => "database",
            BlockKind::DataView => "data_view",
            BlockKind::SurfaceRef => "surface_ref",
            BlockKind::Frame => "frame",
            BlockKind::EdgelessText => "edgeless_text",
            BlockKind::Note => "note",
            BlockKind::Page => "page",
            BlockKind::Surface => "surface",
        }
    }

    /// Stored `sys:flavour`.
    ///
    /// `data_view` resolves to the database flavour: a dedicated data-view
    /// flavour does not render on current servers, so the shim stays until
    /// that is fixed upstream.
    pub fn flavour(self) -> &'static str {
        match self {
            BlockKind::Paragraph | BlockKind::Heading | BlockKind::Quote => "affine:paragraph",
            BlockKind::List => "affine:list",
            BlockKind::Code => "affine:code",
            BlockKind::Divider => "affine:divider",
            BlockKind::Callout => "affine:callout",
            BlockKind::Latex => "affine:latex",
            BlockKind::Table => "affine:table",
            BlockKind::Bookmark => "affine:bookmark",
            BlockKind::Image => "affine:image",
            BlockKind::Attachment => "affine:attachment",
            BlockKind::EmbedYoutube => "affine:embed-youtube",
            BlockKind::EmbedGithub => "affine:embed-github",
            BlockKind::EmbedFigma => "affine:embed-figma",
            BlockKind::EmbedLoom => "affine:embed-loom",
            BlockKind::EmbedHtml => "affine:embed-html",
            BlockKind::EmbedLinkedDoc => "affine:embed-linked-doc",
            BlockKind::EmbedSyncedDoc => "affine:embed-synced-doc",
            BlockKind::EmbedIframe => "affine:embed-iframe",
            BlockKind::Database | BlockKind::DataView => "affine:database",
            BlockKind::SurfaceRef => "affine:surface-ref",
            BlockKind::Frame => "affine:frame",
            BlockKind::EdgelessText => "affine:edgeless-text",
            BlockKind::Note => "affine:note",
            BlockKind::Page => "affine:page",
            BlockKind::Surface => "affine:surface",
        }
    }

    /// Stored `sys:version`.
    pub fn version(self) -> u32 {
        match self {
            BlockKind::Page => PAGE_VERSION,
            BlockKind::Surface => SURFACE_VERSION,
            _ => 1,
        }
    }

    /// Root kinds exist once per document and are only created with it.
    pub fn is_appendable(self) -> bool {
        !matches!(self, BlockKind::Page | BlockKind::Surface)
    }

    /// Canvas kinds live under the surface block.
    pub fn is_canvas(self) -> bool {
        matches!(self, BlockKind::Frame | BlockKind::EdgelessText)
    }

    /// Look up a canonical name. Case and `-`/`_` are not significant.
    pub fn from_name(name: &str) -> Option<BlockKind> {
        let name = canonicalize(name);
        BlockKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Recover the kind of a stored block from its flavour and `prop:type`.
    ///
    /// The database flavour always reads back as [`BlockKind::Database`].
    pub fn from_stored(flavour: &str, block_type: Option<&str>) -> Option<BlockKind> {
        if flavour == "affine:paragraph" {
            return Some(match block_type {
                Some("quote") => BlockKind::Quote,
                Some(t) if heading_level(t).is_some() => BlockKind::Heading,
                _ => BlockKind::Paragraph,
            });
        }
        BlockKind::ALL
            .into_iter()
            .filter(|kind| *kind != BlockKind::DataView)
            .find(|kind| kind.flavour() == flavour)
    }

    /// Request fields meaningful for this kind, besides `type`, `docId`,
    /// `strict` and `placement`.
    pub fn allowed_fields(self) -> &'static [&'static str] {
        match self {
            BlockKind::Paragraph | BlockKind::Quote => &["text"],
            BlockKind::Heading => &["text", "level"],
            BlockKind::List => &["text", "style", "checked"],
            BlockKind::Code => &["text", "language", "caption", "wrap"],
            BlockKind::Divider => &[],
            BlockKind::Callout => &["text", "emoji"],
            BlockKind::Latex => &["latex"],
            BlockKind::Table => &["rows", "columns"],
            BlockKind::Bookmark => &["url", "style", "title", "description", "caption"],
            BlockKind::Image => &["sourceId", "caption", "width", "height"],
            BlockKind::Attachment => &["sourceId", "name", "mimeType", "size", "embed", "caption"],
            BlockKind::EmbedYoutube
            | BlockKind::EmbedGithub
            | BlockKind::EmbedFigma
            | BlockKind::EmbedLoom
            | BlockKind::EmbedIframe => &["url", "caption"],
            BlockKind::EmbedHtml => &["html", "design", "caption"],
            BlockKind::EmbedLinkedDoc => &["pageId", "caption"],
            BlockKind::EmbedSyncedDoc => &["pageId"],
            BlockKind::Database | BlockKind::DataView => &["title"],
            BlockKind::SurfaceRef => &["reference", "refFlavour", "caption"],
            BlockKind::Frame => &["title", "width", "height", "background"],
            BlockKind::EdgelessText => &["width", "height"],
            BlockKind::Note => &["width", "height", "background"],
            BlockKind::Page => &["title"],
            BlockKind::Surface => &[],
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// List marker style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStyle {
    /// `-` items.
    #[default]
    Bulleted,
    /// `1.` items.
    Numbered,
    /// Checkbox items; the only style that stores `checked`.
    Todo,
}

impl ListStyle {
    /// Stored `prop:type` value.
    pub fn as_str(self) -> &'static str {
        match self {
            ListStyle::Bulleted => "bulleted",
            ListStyle::Numbered => "numbered",
            ListStyle::Todo => "todo",
        }
    }

    /// Parse a style name, case- and separator-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match canonicalize(value).as_str() {
            "bulleted" => Some(ListStyle::Bulleted),
            "numbered" => Some(ListStyle::Numbered),
            "todo" => Some(ListStyle::Todo),
            _ => None,
        }
    }
}

/// Bookmark card style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookmarkStyle {
    /// Image above the text.
    Vertical,
    /// Image beside the text.
    #[default]
    Horizontal,
    /// Single line.
    List,
    /// Square card.
    Cube,
    /// Inline citation.
    Citation,
}

impl BookmarkStyle {
    /// Stored `prop:style` value.
    pub fn as_str(self) -> &'static str {
        match self {
            BookmarkStyle::Vertical => "vertical",
            BookmarkStyle::Horizontal => "horizontal",
            BookmarkStyle::List => "list",
            BookmarkStyle::Cube => "cube",
            BookmarkStyle::Citation => "citation",
        }
    }

    /// Parse a style name, case- and separator-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match canonicalize(value).as_str() {
            "vertical" => Some(BookmarkStyle::Vertical),
            "horizontal" => Some(BookmarkStyle::Horizontal),
            "list" => Some(BookmarkStyle::List),
            "cube" => Some(BookmarkStyle::Cube),
            "citation" => Some(BookmarkStyle::Citation),
            _ => None,
        }
    }
}

/// What a legacy type name pins down besides the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyPreset {
    /// `heading1`..`heading3`.
    HeadingLevel(u8),
    /// `bulleted_list`, `numbered_list`, `todo`.
    ListStyle(ListStyle),
}

/// A legacy type name kept for older callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyAlias {
    /// Alias as accepted in requests.
    pub name: &'static str,
    /// Kind the alias resolves to.
    pub kind: BlockKind,
    /// What the alias fixes besides the kind.
    pub preset: LegacyPreset,
}

const LEGACY_ALIASES: [LegacyAlias; 6] = [
    LegacyAlias {
        name: "heading1",
        kind: BlockKind::Heading,
        preset: LegacyPreset::HeadingLevel(1),
    },
    LegacyAlias {
        name: "heading2",
        kind: BlockKind::Heading,
        preset: LegacyPreset::HeadingLevel(2),
    },
    LegacyAlias {
        name: "heading3",
        kind: BlockKind::Heading,
        preset: LegacyPreset::HeadingLevel(3),
    },
    LegacyAlias {
        name: "bulleted_list",
        kind: BlockKind::List,
        preset: LegacyPreset::ListStyle(ListStyle::Bulleted),
    },
    LegacyAlias {
        name: "numbered_list",
        kind: BlockKind::List,
        preset: LegacyPreset::ListStyle(ListStyle::Numbered),
    },
    LegacyAlias {
        name: "todo",
        kind: BlockKind::List,
        preset: LegacyPreset::ListStyle(ListStyle::Todo),
    },
];

/// Look up a legacy alias.
pub fn legacy_alias(name: &str) -> Option<LegacyAlias> {
    let name = canonicalize(name);
    LEGACY_ALIASES.into_iter().find(|alias| alias.name == name)
}

/// Parse a stored paragraph type (`h1`..`h6`) into a heading level.
pub fn heading_level(block_type: &str) -> Option<u8> {
    let level = block_type.strip_prefix('h')?.parse::<u8>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

fn canonicalize(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}
