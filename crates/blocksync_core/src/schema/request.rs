//! Tool-facing request shapes, as received from callers.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Input of the append operation.
///
/// ```json
/// { "docId": "…", "type": "heading", "level": 2, "text": "Intro",
///   "strict": true, "placement": { "afterBlockId": "…" } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendBlockRequest {
    /// Document to append to.
    pub doc_id: String,

    /// Canonical kind name or legacy alias.
    #[serde(rename = "type")]
    pub block_type: String,

    /// Closed field-set checking; defaults to on.
    pub strict: Option<bool>,

    /// Where to put the block; omitted means the implicit parent.
    pub placement: Option<PlacementInput>,

    /// Kind-specific fields, inline in the request object.
    #[serde(flatten)]
    pub fields: BlockFields,
}

impl AppendBlockRequest {
    /// Request with no kind-specific fields.
    pub fn new(doc_id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            block_type: block_type.into(),
            ..Default::default()
        }
    }
}

/// Caller-supplied placement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementInput {
    /// Parent block id.
    pub parent_id: Option<String>,
    /// Insert right after this sibling.
    pub after_block_id: Option<String>,
    /// Insert right before this sibling.
    pub before_block_id: Option<String>,
    /// Position among the parent's children.
    pub index: Option<i64>,
}

/// Kind-specific fields. Anything unrecognised lands in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFields {
    /// Text content (paragraph, heading, quote, list, code, callout).
    pub text: Option<String>,
    /// Heading level.
    pub level: Option<i64>,
    /// List or bookmark style.
    pub style: Option<String>,
    /// Todo state.
    pub checked: Option<bool>,
    /// Code language.
    pub language: Option<String>,
    /// Caption of media, code and embeds.
    pub caption: Option<String>,
    /// Code soft-wrap.
    pub wrap: Option<bool>,
    /// Callout emoji.
    pub emoji: Option<String>,
    /// LaTeX expression.
    pub latex: Option<String>,
    /// Table rows.
    pub rows: Option<i64>,
    /// Table columns.
    pub columns: Option<i64>,
    /// Target URL of bookmarks and URL embeds.
    pub url: Option<String>,
    /// Title of bookmarks, frames and databases.
    pub title: Option<String>,
    /// Bookmark description.
    pub description: Option<String>,
    /// Blob id of images and attachments.
    pub source_id: Option<String>,
    /// Attachment file name.
    pub name: Option<String>,
    /// Attachment MIME type.
    pub mime_type: Option<String>,
    /// Attachment size in bytes.
    pub size: Option<i64>,
    /// Show an attachment inline.
    pub embed: Option<bool>,
    /// Width of images and canvas blocks.
    pub width: Option<f64>,
    /// Height of images and canvas blocks.
    pub height: Option<f64>,
    /// HTML of an HTML embed.
    pub html: Option<String>,
    /// Design payload of an HTML embed.
    pub design: Option<String>,
    /// Target page of linked and synced doc embeds.
    pub page_id: Option<String>,
    /// Referenced element of a surface reference.
    pub reference: Option<String>,
    /// Flavour tag of the referenced element.
    pub ref_flavour: Option<String>,
    /// Background token of notes and frames.
    pub background: Option<String>,

    /// Unrecognised fields, rejected in strict mode.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockFields {
    /// Wire names of the recognised fields that were supplied.
    pub fn present(&self) -> Vec<&'static str> {
        let flags = [
            ("text", self.text.is_some()),
            ("level", self.level.is_some()),
            ("style", self.style.is_some()),
            ("checked", self.checked.is_some()),
            ("language", self.language.is_some()),
            ("caption", self.caption.is_some()),
            ("wrap", self.wrap.is_some()),
            ("emoji", self.emoji.is_some()),
            ("latex", self.latex.is_some()),
            ("rows", self.rows.is_some()),
            ("columns", self.columns.is_some()),
            ("url", self.url.is_some()),
            ("title", self.title.is_some()),
            ("description", self.description.is_some()),
            ("sourceId", self.source_id.is_some()),
            ("name", self.name.is_some()),
            ("mimeType", self.mime_type.is_some()),
            ("size", self.size.is_some()),
            ("embed", self.embed.is_some()),
            ("width", self.width.is_some()),
            ("height", self.height.is_some()),
            ("html", self.html.is_some()),
            ("design", self.design.is_some()),
            ("pageId", self.page_id.is_some()),
            ("reference", self.reference.is_some()),
            ("refFlavour", self.ref_flavour.is_some()),
            ("background", self.background.is_some()),
        ];
        flags
            .into_iter()
            .filter_map(|(name, present)| present.then_some(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_tool_input() {
        let request: AppendBlockRequest = serde_json::from_value(json!({
            "docId": "doc1",
            "type": "code",
            "language": "python",
            "text": "print(1)",
            "placement": { "afterBlockId": "b1" },
            "colour": "red"
        }))
        .unwrap();

        assert_eq!(request.doc_id, "doc1");
        assert_eq!(request.block_type, "code");
        assert_eq!(request.strict, None);
        assert_eq!(request.fields.language.as_deref(), Some("python"));
        assert_eq!(
            request.placement.unwrap().after_block_id.as_deref(),
            Some("b1")
        );
        assert_eq!(request.fields.present(), vec!["text", "language"]);
        assert!(request.fields.extra.contains_key("colour"));
    }

    #[test]
    fn test_camel_case_fields() {
        let request: AppendBlockRequest = serde_json::from_value(json!({
            "docId": "doc1",
            "type": "attachment",
            "sourceId": "blob",
            "mimeType": "text/plain",
            "name": "a.txt"
        }))
        .unwrap();
        assert_eq!(request.fields.source_id.as_deref(), Some("blob"));
        assert_eq!(request.fields.mime_type.as_deref(), Some("text/plain"));
        assert!(request.fields.extra.is_empty());
    }
}
