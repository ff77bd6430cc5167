//! Block schema: kind registry, request shapes and validation.

mod kinds;
mod normalize;
mod request;

pub use kinds::{
    BlockKind, BookmarkStyle, LegacyAlias, LegacyPreset, ListStyle, heading_level, legacy_alias,
};
pub use normalize::{
    BlockSpec, DEFAULT_LANGUAGE, DEFAULT_NOTE_BACKGROUND, EmbedKind, Geometry, MAX_LANGUAGE_LEN,
    NormalizedRequest, Placement, normalize,
};
pub use request::{AppendBlockRequest, BlockFields, PlacementInput};
