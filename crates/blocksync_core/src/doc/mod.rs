#![doc = include_str!(concat!(env!("OUT_DIR"), "/doc_README.md"))]

mod block_doc;
/// Conversions between block property values, yrs values and JSON.
pub mod values;
mod workspace_index;

pub use block_doc::{BlockDoc, DocMeta, Insertion};
pub use values::new_text;
pub use workspace_index::{PageEntry, WorkspaceIndex};
