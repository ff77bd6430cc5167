//! Request validation and normalization.
//!
//! [`normalize`] turns an [`AppendBlockRequest`] into a [`NormalizedRequest`]
//! whose [`BlockSpec`] carries exactly the payload its kind needs, with
//! defaults applied. It is pure: nothing here touches the network.

use super::kinds::{BlockKind, BookmarkStyle, LegacyPreset, ListStyle, legacy_alias};
use super::request::{AppendBlockRequest, BlockFields, PlacementInput};
use crate::error::ValidationError;

/// Longest accepted code language tag.
pub const MAX_LANGUAGE_LEN: usize = 64;
/// Default code language.
pub const DEFAULT_LANGUAGE: &str = "txt";
/// Table dimension bounds and default.
pub const TABLE_DIM_RANGE: (u32, u32) = (1, 20);
/// Default table rows and columns.
pub const DEFAULT_TABLE_DIM: u32 = 3;
/// Canvas geometry bounds and default.
pub const GEOMETRY_RANGE: (f64, f64) = (1.0, 10_000.0);
/// Default canvas width and height.
pub const DEFAULT_GEOMETRY: f64 = 100.0;

const DEFAULT_CALLOUT_EMOJI: &str = "💡";
const DEFAULT_FRAME_TITLE: &str = "Frame";
/// Background token of a fresh frame.
pub const DEFAULT_FRAME_BACKGROUND: &str = "--affine-palette-transparent";
/// Background token of a fresh note.
pub const DEFAULT_NOTE_BACKGROUND: &str = "--affine-note-background-white";

/// Width and height of a canvas block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Width in canvas units.
    pub width: f64,
    /// Height in canvas units.
    pub height: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_GEOMETRY,
            height: DEFAULT_GEOMETRY,
        }
    }
}

/// URL-bearing embed kinds that share a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    /// `affine:embed-youtube`.
    Youtube,
    /// `affine:embed-github`.
    Github,
    /// `affine:embed-figma`.
    Figma,
    /// `affine:embed-loom`.
    Loom,
    /// `affine:embed-iframe`.
    Iframe,
}

impl EmbedKind {
    /// The block kind for this embed.
    pub fn kind(self) -> BlockKind {
        match self {
            EmbedKind::Youtube => BlockKind::EmbedYoutube,
            EmbedKind::Github => BlockKind::EmbedGithub,
            EmbedKind::Figma => BlockKind::EmbedFigma,
            EmbedKind::Loom => BlockKind::EmbedLoom,
            EmbedKind::Iframe => BlockKind::EmbedIframe,
        }
    }

    /// Card style stored for a fresh embed.
    pub fn default_style(self) -> &'static str {
        match self {
            EmbedKind::Youtube | EmbedKind::Loom => "video",
            EmbedKind::Github => "horizontal",
            EmbedKind::Figma => "figma",
            EmbedKind::Iframe => "iframe",
        }
    }
}

/// Validated payload of a block, one variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockSpec {
    /// Plain text.
    Paragraph {
        /// Initial text.
        text: String,
    },
    /// Heading at `level`.
    Heading {
        /// 1 to 6.
        level: u8,
        /// Initial text.
        text: String,
    },
    /// Quoted text.
    Quote {
        /// Initial text.
        text: String,
    },
    /// List item.
    List {
        /// Marker style.
        style: ListStyle,
        /// Only meaningful for [`ListStyle::Todo`].
        checked: bool,
        /// Initial text.
        text: String,
    },
    /// Code with a language tag.
    Code {
        /// Language tag, at most 64 characters.
        language: String,
        /// Initial text.
        text: String,
        /// Caption, possibly empty.
        caption: String,
        /// Soft-wrap long lines.
        wrap: bool,
    },
    /// Horizontal rule.
    Divider,
    /// Text behind an emoji.
    Callout {
        /// Leading emoji.
        emoji: String,
        /// Initial text.
        text: String,
    },
    /// Display math.
    Latex {
        /// LaTeX source.
        latex: String,
    },
    /// Empty table of `rows` by `columns`.
    Table {
        /// Row count.
        rows: u32,
        /// Column count.
        columns: u32,
    },
    /// Link card.
    Bookmark {
        /// Absolute http(s) URL.
        url: String,
        /// Card style.
        style: BookmarkStyle,
        /// Title, possibly empty.
        title: String,
        /// Card description.
        description: String,
        /// Caption, possibly empty.
        caption: String,
    },
    /// Uploaded image.
    Image {
        /// Blob id from a prior upload.
        source_id: String,
        /// Caption, possibly empty.
        caption: String,
        /// Display width.
        width: f64,
        /// Display height.
        height: f64,
    },
    /// Uploaded file.
    Attachment {
        /// Blob id from a prior upload.
        source_id: String,
        /// File name.
        name: String,
        /// MIME type.
        mime_type: String,
        /// Size in bytes.
        size: i64,
        /// Show inline rather than as a card.
        embed: bool,
        /// Caption, possibly empty.
        caption: String,
    },
    /// URL embed of one of the [`EmbedKind`]s.
    Embed {
        /// Which embed.
        kind: EmbedKind,
        /// Absolute http(s) URL.
        url: String,
        /// Caption, possibly empty.
        caption: String,
    },
    /// HTML or design embed.
    EmbedHtml {
        /// Raw HTML.
        html: String,
        /// Design payload.
        design: String,
        /// Caption, possibly empty.
        caption: String,
    },
    /// Card for another page.
    EmbedLinkedDoc {
        /// Target page id.
        page_id: String,
        /// Caption, possibly empty.
        caption: String,
    },
    /// Live copy of another page.
    EmbedSyncedDoc {
        /// Target page id.
        page_id: String,
    },
    /// Empty database.
    Database {
        /// Title, possibly empty.
        title: String,
    },
    /// Compatibility shim: built as a database block.
    DataView {
        /// Title, possibly empty.
        title: String,
    },
    /// Reference to a canvas element.
    SurfaceRef {
        /// Referenced element id.
        reference: String,
        /// Flavour tag of the referenced element.
        ref_flavour: String,
        /// Caption, possibly empty.
        caption: String,
    },
    /// Canvas frame.
    Frame {
        /// Title, possibly empty.
        title: String,
        /// Canvas size.
        geometry: Geometry,
        /// Background colour token.
        background: String,
    },
    /// Canvas text box.
    EdgelessText {
        /// Canvas size.
        geometry: Geometry,
    },
    /// Content container.
    Note {
        /// Canvas size.
        geometry: Geometry,
        /// Background colour token.
        background: String,
    },
    /// Document root.
    Page {
        /// Page title.
        title: String,
    },
    /// Canvas root.
    Surface,
}

impl BlockSpec {
    /// Kind this payload builds.
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockSpec::Paragraph { .. } => BlockKind::Paragraph,
            BlockSpec::Heading { .. } => BlockKind::Heading,
            BlockSpec::Quote { .. } => BlockKind::Quote,
            BlockSpec::List { .. } => BlockKind::List,
            BlockSpec::Code { .. } => BlockKind::Code,
            BlockSpec::Divider => BlockKind::Divider,
            BlockSpec::Callout { .. } => BlockKind::Callout,
            BlockSpec::Latex { .. } => BlockKind::Latex,
            BlockSpec::Table { .. } => BlockKind::Table,
            BlockSpec::Bookmark { .. } => BlockKind::Bookmark,
            BlockSpec::Image { .. } => BlockKind::Image,
            BlockSpec::Attachment { .. } => BlockKind::Attachment,
            BlockSpec::Embed { kind, .. } => kind.kind(),
            BlockSpec::EmbedHtml { .. } => BlockKind::EmbedHtml,
            BlockSpec::EmbedLinkedDoc { .. } => BlockKind::EmbedLinkedDoc,
            BlockSpec::EmbedSyncedDoc { .. } => BlockKind::EmbedSyncedDoc,
            BlockSpec::Database { .. } => BlockKind::Database,
            BlockSpec::DataView { .. } => BlockKind::DataView,
            BlockSpec::SurfaceRef { .. } => BlockKind::SurfaceRef,
            BlockSpec::Frame { .. } => BlockKind::Frame,
            BlockSpec::EdgelessText { .. } => BlockKind::EdgelessText,
            BlockSpec::Note { .. } => BlockKind::Note,
            BlockSpec::Page { .. } => BlockKind::Page,
            BlockSpec::Surface => BlockKind::Surface,
        }
    }

    /// A note with default geometry and background.
    pub fn default_note() -> Self {
        BlockSpec::Note {
            geometry: Geometry::default(),
            background: DEFAULT_NOTE_BACKGROUND.to_string(),
        }
    }
}

/// Where the caller wants the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Directly after a sibling.
    After(String),
    /// Directly before a sibling.
    Before(String),
    /// Under `parent_id` (or the implicit parent for the kind) at `index`
    /// (or the end).
    Within {
        /// Explicit parent; `None` picks the implicit parent.
        parent_id: Option<String>,
        /// Position among the parent's children; `None` appends.
        index: Option<usize>,
    },
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Within {
            parent_id: None,
            index: None,
        }
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    /// Target document id, trimmed.
    pub doc_id: String,
    /// Validated payload.
    pub spec: BlockSpec,
    /// Requested placement.
    pub placement: Placement,
    /// Whether strict validation applied.
    pub strict: bool,
    /// The legacy alias the caller used, if any.
    pub legacy_type: Option<String>,
}

impl NormalizedRequest {
    /// Kind of the block to build.
    pub fn kind(&self) -> BlockKind {
        self.spec.kind()
    }

    /// Canonical type name of the block.
    pub fn normalized_type(&self) -> &'static str {
        self.kind().name()
    }
}

/// Validate and normalize an append request.
pub fn normalize(request: &AppendBlockRequest) -> Result<NormalizedRequest, ValidationError> {
    let strict = request.strict.unwrap_or(true);

    let (kind, preset, legacy_type) = match legacy_alias(&request.block_type) {
        Some(alias) => (alias.kind, Some(alias.preset), Some(alias.name.to_string())),
        None => {
            let kind = BlockKind::from_name(&request.block_type)
                .ok_or_else(|| ValidationError::UnsupportedKind(request.block_type.clone()))?;
            (kind, None, None)
        }
    };
    if !kind.is_appendable() {
        return Err(ValidationError::NotAppendable(kind.name().to_string()));
    }
    let doc_id = request.doc_id.trim();
    if doc_id.is_empty() {
        return Err(missing("docId", kind));
    }

    let placement = normalize_placement(request.placement.as_ref(), strict)?;

    if strict {
        check_closed_field_set(kind, &request.fields)?;
    }

    let spec = build_spec(kind, preset, &request.fields, strict)?;

    Ok(NormalizedRequest {
        doc_id: doc_id.to_string(),
        spec,
        placement,
        strict,
        legacy_type,
    })
}

fn check_closed_field_set(kind: BlockKind, fields: &BlockFields) -> Result<(), ValidationError> {
    if let Some(unknown) = fields.extra.keys().next() {
        return Err(ValidationError::UnknownField(unknown.clone()));
    }
    let allowed = kind.allowed_fields();
    if let Some(field) = fields.present().into_iter().find(|f| !allowed.contains(f)) {
        return Err(ValidationError::FieldNotAllowed {
            field: field.to_string(),
            kind: kind.name().to_string(),
        });
    }
    Ok(())
}

fn normalize_placement(
    input: Option<&PlacementInput>,
    strict: bool,
) -> Result<Placement, ValidationError> {
    let Some(input) = input else {
        return Ok(Placement::default());
    };
    let after = non_empty(input.after_block_id.as_deref());
    let before = non_empty(input.before_block_id.as_deref());
    let parent = non_empty(input.parent_id.as_deref());

    match (after, before) {
        (Some(_), Some(_)) => Err(ValidationError::ConflictingPlacement(
            "afterBlockId and beforeBlockId".to_string(),
        )),
        (Some(_), None) | (None, Some(_)) if input.index.is_some() => Err(
            ValidationError::ConflictingPlacement("afterBlockId/beforeBlockId and index".to_string()),
        ),
        (Some(_), None) | (None, Some(_)) if parent.is_some() => {
            Err(ValidationError::ConflictingPlacement(
                "afterBlockId/beforeBlockId and parentId".to_string(),
            ))
        }
        (Some(id), None) => Ok(Placement::After(id)),
        (None, Some(id)) => Ok(Placement::Before(id)),
        (None, None) => {
            let index = match input.index {
                Some(i) if i < 0 && strict => {
                    return Err(ValidationError::invalid("index", "must not be negative"));
                }
                Some(i) => Some(i.max(0) as usize),
                None => None,
            };
            Ok(Placement::Within {
                parent_id: parent,
                index,
            })
        }
    }
}

fn build_spec(
    kind: BlockKind,
    preset: Option<LegacyPreset>,
    fields: &BlockFields,
    strict: bool,
) -> Result<BlockSpec, ValidationError> {
    let text = || fields.text.clone().unwrap_or_default();
    let caption = || fields.caption.clone().unwrap_or_default();

    let spec = match kind {
        BlockKind::Paragraph => BlockSpec::Paragraph { text: text() },
        BlockKind::Quote => BlockSpec::Quote { text: text() },
        BlockKind::Heading => BlockSpec::Heading {
            level: heading_level(preset, fields.level, strict)?,
            text: text(),
        },
        BlockKind::List => {
            let style = list_style(preset, fields.style.as_deref(), strict)?;
            if style != ListStyle::Todo && fields.checked.is_some() && strict {
                return Err(ValidationError::FieldNotAllowed {
                    field: "checked".to_string(),
                    kind: format!("list ({})", style.as_str()),
                });
            }
            BlockSpec::List {
                style,
                checked: style == ListStyle::Todo && fields.checked.unwrap_or(false),
                text: text(),
            }
        }
        BlockKind::Code => BlockSpec::Code {
            language: code_language(fields.language.as_deref(), strict)?,
            text: text(),
            caption: caption(),
            wrap: fields.wrap.unwrap_or(false),
        },
        BlockKind::Divider => BlockSpec::Divider,
        BlockKind::Callout => BlockSpec::Callout {
            emoji: non_empty(fields.emoji.as_deref())
                .unwrap_or_else(|| DEFAULT_CALLOUT_EMOJI.to_string()),
            text: text(),
        },
        BlockKind::Latex => {
            let latex = fields.latex.clone().unwrap_or_default();
            if strict && latex.trim().is_empty() {
                return Err(missing("latex", kind));
            }
            BlockSpec::Latex { latex }
        }
        BlockKind::Table => BlockSpec::Table {
            rows: table_dim(fields.rows),
            columns: table_dim(fields.columns),
        },
        BlockKind::Bookmark => {
            let style = match fields.style.as_deref() {
                None => BookmarkStyle::default(),
                Some(raw) => match BookmarkStyle::parse(raw) {
                    Some(style) => style,
                    None if strict => {
                        return Err(ValidationError::invalid(
                            "style",
                            format!("'{raw}' is not one of vertical, horizontal, list, cube, citation"),
                        ));
                    }
                    None => BookmarkStyle::default(),
                },
            };
            BlockSpec::Bookmark {
                url: required_url(fields.url.as_deref(), kind)?,
                style,
                title: fields.title.clone().unwrap_or_default(),
                description: fields.description.clone().unwrap_or_default(),
                caption: caption(),
            }
        }
        BlockKind::Image => BlockSpec::Image {
            source_id: required(fields.source_id.as_deref(), "sourceId", kind)?,
            caption: caption(),
            width: fields.width.unwrap_or(0.0).max(0.0),
            height: fields.height.unwrap_or(0.0).max(0.0),
        },
        BlockKind::Attachment => BlockSpec::Attachment {
            source_id: required(fields.source_id.as_deref(), "sourceId", kind)?,
            name: required(fields.name.as_deref(), "name", kind)?,
            mime_type: required(fields.mime_type.as_deref(), "mimeType", kind)?,
            size: fields.size.unwrap_or(0).max(0),
            embed: fields.embed.unwrap_or(false),
            caption: caption(),
        },
        BlockKind::EmbedYoutube
        | BlockKind::EmbedGithub
        | BlockKind::EmbedFigma
        | BlockKind::EmbedLoom
        | BlockKind::EmbedIframe => {
            let embed = match kind {
                BlockKind::EmbedYoutube => EmbedKind::Youtube,
                BlockKind::EmbedGithub => EmbedKind::Github,
                BlockKind::EmbedFigma => EmbedKind::Figma,
                BlockKind::EmbedLoom => EmbedKind::Loom,
                _ => EmbedKind::Iframe,
            };
            BlockSpec::Embed {
                kind: embed,
                url: required_url(fields.url.as_deref(), kind)?,
                caption: caption(),
            }
        }
        BlockKind::EmbedHtml => {
            let html = fields.html.clone().unwrap_or_default();
            let design = fields.design.clone().unwrap_or_default();
            if html.trim().is_empty() && design.trim().is_empty() {
                return Err(missing("html", kind));
            }
            BlockSpec::EmbedHtml {
                html,
                design,
                caption: caption(),
            }
        }
        BlockKind::EmbedLinkedDoc => BlockSpec::EmbedLinkedDoc {
            page_id: required(fields.page_id.as_deref(), "pageId", kind)?,
            caption: caption(),
        },
        BlockKind::EmbedSyncedDoc => BlockSpec::EmbedSyncedDoc {
            page_id: required(fields.page_id.as_deref(), "pageId", kind)?,
        },
        BlockKind::Database => BlockSpec::Database {
            title: fields.title.clone().unwrap_or_default(),
        },
        BlockKind::DataView => BlockSpec::DataView {
            title: fields.title.clone().unwrap_or_default(),
        },
        BlockKind::SurfaceRef => BlockSpec::SurfaceRef {
            reference: required(fields.reference.as_deref(), "reference", kind)?,
            ref_flavour: required(fields.ref_flavour.as_deref(), "refFlavour", kind)?,
            caption: caption(),
        },
        BlockKind::Frame => BlockSpec::Frame {
            title: non_empty(fields.title.as_deref())
                .unwrap_or_else(|| DEFAULT_FRAME_TITLE.to_string()),
            geometry: geometry(fields),
            background: non_empty(fields.background.as_deref())
                .unwrap_or_else(|| DEFAULT_FRAME_BACKGROUND.to_string()),
        },
        BlockKind::EdgelessText => BlockSpec::EdgelessText {
            geometry: geometry(fields),
        },
        BlockKind::Note => BlockSpec::Note {
            geometry: geometry(fields),
            background: non_empty(fields.background.as_deref())
                .unwrap_or_else(|| DEFAULT_NOTE_BACKGROUND.to_string()),
        },
        BlockKind::Page | BlockKind::Surface => {
            return Err(ValidationError::NotAppendable(kind.name().to_string()));
        }
    };
    Ok(spec)
}

fn heading_level(
    preset: Option<LegacyPreset>,
    requested: Option<i64>,
    strict: bool,
) -> Result<u8, ValidationError> {
    if let Some(LegacyPreset::HeadingLevel(level)) = preset {
        if strict && requested.is_some_and(|r| r != i64::from(level)) {
            return Err(ValidationError::invalid(
                "level",
                format!("conflicts with legacy type heading{level}"),
            ));
        }
        return Ok(level);
    }
    Ok(requested.unwrap_or(1).clamp(1, 6) as u8)
}

fn list_style(
    preset: Option<LegacyPreset>,
    requested: Option<&str>,
    strict: bool,
) -> Result<ListStyle, ValidationError> {
    let parsed = match requested {
        None => None,
        Some(raw) => match ListStyle::parse(raw) {
            Some(style) => Some(style),
            None if strict => {
                return Err(ValidationError::invalid(
                    "style",
                    format!("'{raw}' is not one of bulleted, numbered, todo"),
                ));
            }
            None => None,
        },
    };
    if let Some(LegacyPreset::ListStyle(style)) = preset {
        if strict && parsed.is_some_and(|p| p != style) {
            return Err(ValidationError::invalid(
                "style",
                format!("conflicts with legacy list style {}", style.as_str()),
            ));
        }
        return Ok(style);
    }
    Ok(parsed.unwrap_or_default())
}

fn code_language(requested: Option<&str>, strict: bool) -> Result<String, ValidationError> {
    let Some(language) = non_empty(requested) else {
        return Ok(DEFAULT_LANGUAGE.to_string());
    };
    if language.chars().count() <= MAX_LANGUAGE_LEN {
        return Ok(language);
    }
    if strict {
        return Err(ValidationError::invalid(
            "language",
            format!("longer than {MAX_LANGUAGE_LEN} characters"),
        ));
    }
    Ok(language.chars().take(MAX_LANGUAGE_LEN).collect())
}

fn table_dim(requested: Option<i64>) -> u32 {
    let (min, max) = TABLE_DIM_RANGE;
    requested
        .map(|n| n.clamp(i64::from(min), i64::from(max)) as u32)
        .unwrap_or(DEFAULT_TABLE_DIM)
}

fn geometry(fields: &BlockFields) -> Geometry {
    let (min, max) = GEOMETRY_RANGE;
    let clamp = |value: Option<f64>| match value {
        Some(v) if v.is_finite() => v.clamp(min, max),
        _ => DEFAULT_GEOMETRY,
    };
    Geometry {
        width: clamp(fields.width),
        height: clamp(fields.height),
    }
}

fn required(value: Option<&str>, field: &str, kind: BlockKind) -> Result<String, ValidationError> {
    non_empty(value).ok_or_else(|| missing(field, kind))
}

fn required_url(value: Option<&str>, kind: BlockKind) -> Result<String, ValidationError> {
    let raw = required(value, "url", kind)?;
    match url::Url::parse(&raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(raw),
        _ => Err(ValidationError::InvalidUrl(raw)),
    }
}

fn missing(field: &str, kind: BlockKind) -> ValidationError {
    ValidationError::MissingField {
        field: field.to_string(),
        kind: kind.name().to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> AppendBlockRequest {
        serde_json::from_value(value).unwrap()
    }

    fn normalize_json(value: serde_json::Value) -> Result<NormalizedRequest, ValidationError> {
        normalize(&request(value))
    }

    #[test]
    fn test_unknown_kind() {
        let err = normalize_json(json!({"docId": "d", "type": "video"})).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedKind("video".into()));
    }

    #[test]
    fn test_blank_doc_id_is_rejected() {
        for doc_id in ["", "   "] {
            let err = normalize_json(json!({"docId": doc_id, "type": "paragraph"})).unwrap_err();
            assert!(
                matches!(err, ValidationError::MissingField { ref field, .. } if field == "docId")
            );
        }
        let normalized = normalize_json(json!({"docId": " d1 ", "type": "paragraph"})).unwrap();
        assert_eq!(normalized.doc_id, "d1");
    }

    #[test]
    fn test_root_kinds_are_not_appendable() {
        let err = normalize_json(json!({"docId": "d", "type": "page"})).unwrap_err();
        assert_eq!(err, ValidationError::NotAppendable("page".into()));
        let err = normalize_json(json!({"docId": "d", "type": "surface"})).unwrap_err();
        assert_eq!(err, ValidationError::NotAppendable("surface".into()));
    }

    #[test]
    fn test_heading_defaults_to_level_one() {
        let normalized =
            normalize_json(json!({"docId": "d", "type": "heading", "text": "Intro"})).unwrap();
        assert_eq!(
            normalized.spec,
            BlockSpec::Heading {
                level: 1,
                text: "Intro".into()
            }
        );
        assert_eq!(normalized.normalized_type(), "heading");
        assert_eq!(normalized.legacy_type, None);
    }

    #[test]
    fn test_heading_level_is_clamped() {
        let normalized =
            normalize_json(json!({"docId": "d", "type": "heading", "level": 9})).unwrap();
        assert!(matches!(normalized.spec, BlockSpec::Heading { level: 6, .. }));
        let normalized =
            normalize_json(json!({"docId": "d", "type": "heading", "level": 0})).unwrap();
        assert!(matches!(normalized.spec, BlockSpec::Heading { level: 1, .. }));
    }

    #[test]
    fn test_legacy_heading_alias() {
        let normalized =
            normalize_json(json!({"docId": "d", "type": "heading2", "text": "x"})).unwrap();
        assert!(matches!(normalized.spec, BlockSpec::Heading { level: 2, .. }));
        assert_eq!(normalized.legacy_type.as_deref(), Some("heading2"));
        assert_eq!(normalized.normalized_type(), "heading");
    }

    #[test]
    fn test_legacy_alias_conflict_is_strict_only() {
        let err = normalize_json(json!({"docId": "d", "type": "heading2", "level": 3})).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "level"));

        let normalized = normalize_json(
            json!({"docId": "d", "type": "heading2", "level": 3, "strict": false}),
        )
        .unwrap();
        assert!(matches!(normalized.spec, BlockSpec::Heading { level: 2, .. }));
    }

    #[test]
    fn test_todo_list_keeps_checked() {
        let normalized = normalize_json(
            json!({"docId": "d", "type": "list", "style": "todo", "checked": true, "text": "ship"}),
        )
        .unwrap();
        assert_eq!(
            normalized.spec,
            BlockSpec::List {
                style: ListStyle::Todo,
                checked: true,
                text: "ship".into()
            }
        );
    }

    #[test]
    fn test_list_defaults_to_bulleted_and_rejects_checked() {
        let normalized = normalize_json(json!({"docId": "d", "type": "list"})).unwrap();
        assert!(matches!(
            normalized.spec,
            BlockSpec::List {
                style: ListStyle::Bulleted,
                checked: false,
                ..
            }
        ));

        let err =
            normalize_json(json!({"docId": "d", "type": "list", "checked": true})).unwrap_err();
        assert!(matches!(err, ValidationError::FieldNotAllowed { ref field, .. } if field == "checked"));

        let normalized =
            normalize_json(json!({"docId": "d", "type": "list", "checked": true, "strict": false}))
                .unwrap();
        assert!(matches!(normalized.spec, BlockSpec::List { checked: false, .. }));
    }

    #[test]
    fn test_legacy_todo_alias() {
        let normalized =
            normalize_json(json!({"docId": "d", "type": "todo", "checked": true})).unwrap();
        assert!(matches!(
            normalized.spec,
            BlockSpec::List {
                style: ListStyle::Todo,
                checked: true,
                ..
            }
        ));
        assert_eq!(normalized.legacy_type.as_deref(), Some("todo"));
    }

    #[test]
    fn test_strict_mode_rejects_foreign_fields() {
        let err = normalize_json(json!({"docId": "d", "type": "paragraph", "url": "https://x.io"}))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::FieldNotAllowed {
                field: "url".into(),
                kind: "paragraph".into()
            }
        );

        let err = normalize_json(json!({"docId": "d", "type": "code", "rows": 2})).unwrap_err();
        assert!(matches!(err, ValidationError::FieldNotAllowed { ref field, .. } if field == "rows"));

        let err =
            normalize_json(json!({"docId": "d", "type": "paragraph", "colour": "red"})).unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("colour".into()));
    }

    #[test]
    fn test_lenient_mode_ignores_foreign_fields() {
        let normalized = normalize_json(json!({
            "docId": "d", "type": "paragraph", "url": "https://x.io", "colour": "red", "strict": false
        }))
        .unwrap();
        assert_eq!(normalized.spec, BlockSpec::Paragraph { text: String::new() });
        assert!(!normalized.strict);
    }

    #[test]
    fn test_code_language_rules() {
        let normalized = normalize_json(json!({"docId": "d", "type": "code"})).unwrap();
        assert!(matches!(normalized.spec, BlockSpec::Code { ref language, .. } if language == "txt"));

        let long = "x".repeat(65);
        let err =
            normalize_json(json!({"docId": "d", "type": "code", "language": long})).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "language"));

        let normalized = normalize_json(
            json!({"docId": "d", "type": "code", "language": "y".repeat(80), "strict": false}),
        )
        .unwrap();
        assert!(
            matches!(normalized.spec, BlockSpec::Code { ref language, .. } if language.len() == 64)
        );
    }

    #[test]
    fn test_table_dimensions() {
        let normalized = normalize_json(json!({"docId": "d", "type": "table"})).unwrap();
        assert_eq!(normalized.spec, BlockSpec::Table { rows: 3, columns: 3 });
        let normalized =
            normalize_json(json!({"docId": "d", "type": "table", "rows": 50, "columns": 0}))
                .unwrap();
        assert_eq!(normalized.spec, BlockSpec::Table { rows: 20, columns: 1 });
    }

    #[test]
    fn test_url_kinds_require_valid_url() {
        let err = normalize_json(json!({"docId": "d", "type": "bookmark"})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field, .. } if field == "url"));

        let err = normalize_json(json!({"docId": "d", "type": "embed_youtube", "url": "not a url"}))
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidUrl("not a url".into()));

        let normalized = normalize_json(
            json!({"docId": "d", "type": "bookmark", "url": "https://example.com", "style": "cube"}),
        )
        .unwrap();
        assert!(matches!(
            normalized.spec,
            BlockSpec::Bookmark {
                style: BookmarkStyle::Cube,
                ..
            }
        ));
    }

    #[test]
    fn test_blob_kinds_require_source() {
        let err = normalize_json(json!({"docId": "d", "type": "image"})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field, .. } if field == "sourceId"));

        let err = normalize_json(json!({"docId": "d", "type": "attachment", "sourceId": "s"}))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field, .. } if field == "name"));
    }

    #[test]
    fn test_latex_requires_expression_in_strict_mode() {
        let err = normalize_json(json!({"docId": "d", "type": "latex", "latex": "  "})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field, .. } if field == "latex"));
        assert!(normalize_json(json!({"docId": "d", "type": "latex", "strict": false})).is_ok());
    }

    #[test]
    fn test_reference_kinds() {
        let err = normalize_json(json!({"docId": "d", "type": "embed_linked_doc"})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { ref field, .. } if field == "pageId"));

        let err = normalize_json(json!({"docId": "d", "type": "embed_html"})).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { .. }));
        assert!(
            normalize_json(json!({"docId": "d", "type": "embed_html", "design": "{}"})).is_ok()
        );

        let err = normalize_json(json!({"docId": "d", "type": "surface_ref", "reference": "r"}))
            .unwrap_err();
        assert!(
            matches!(err, ValidationError::MissingField { ref field, .. } if field == "refFlavour")
        );
    }

    #[test]
    fn test_canvas_geometry() {
        let normalized = normalize_json(json!({"docId": "d", "type": "frame"})).unwrap();
        match normalized.spec {
            BlockSpec::Frame {
                title, geometry, ..
            } => {
                assert_eq!(title, "Frame");
                assert_eq!(geometry, Geometry::default());
            }
            other => panic!("unexpected spec {other:?}"),
        }

        let normalized = normalize_json(
            json!({"docId": "d", "type": "note", "width": 0, "height": 20000}),
        )
        .unwrap();
        assert!(matches!(
            normalized.spec,
            BlockSpec::Note {
                geometry: Geometry {
                    width: 1.0,
                    height: 10_000.0
                },
                ..
            }
        ));
    }

    #[test]
    fn test_data_view_is_labelled_shim() {
        let normalized = normalize_json(json!({"docId": "d", "type": "data_view"})).unwrap();
        assert_eq!(normalized.kind(), BlockKind::DataView);
        assert_eq!(normalized.kind().flavour(), "affine:database");
    }

    #[test]
    fn test_after_and_before_are_exclusive() {
        for kind in ["paragraph", "note", "frame", "divider"] {
            let err = normalize_json(json!({
                "docId": "d", "type": kind,
                "placement": {"afterBlockId": "a", "beforeBlockId": "b"}
            }))
            .unwrap_err();
            assert!(matches!(err, ValidationError::ConflictingPlacement(_)), "{kind}");
        }
    }

    #[test]
    fn test_sibling_placement_excludes_index_and_parent() {
        let err = normalize_json(json!({
            "docId": "d", "type": "paragraph",
            "placement": {"afterBlockId": "a", "index": 0}
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::ConflictingPlacement(_)));

        let err = normalize_json(json!({
            "docId": "d", "type": "paragraph",
            "placement": {"beforeBlockId": "a", "parentId": "p"}
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::ConflictingPlacement(_)));
    }

    #[test]
    fn test_placement_variants() {
        let normalized = normalize_json(json!({
            "docId": "d", "type": "paragraph", "placement": {"beforeBlockId": "b"}
        }))
        .unwrap();
        assert_eq!(normalized.placement, Placement::Before("b".into()));

        let normalized = normalize_json(json!({
            "docId": "d", "type": "paragraph", "placement": {"parentId": "p", "index": 2}
        }))
        .unwrap();
        assert_eq!(
            normalized.placement,
            Placement::Within {
                parent_id: Some("p".into()),
                index: Some(2)
            }
        );

        let err = normalize_json(json!({
            "docId": "d", "type": "paragraph", "placement": {"parentId": "p", "index": -1}
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "index"));
    }
}
