use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Local validation failures.
///
/// Raised before any network I/O (field checks) or right after the snapshot
/// load (placement checks). Never retried: the caller has to fix the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The requested type is neither a kind nor a legacy alias.
    #[error("Unsupported block type '{0}'")]
    UnsupportedKind(String),

    /// Root kinds (page, surface) are never appended.
    #[error("Block type '{0}' cannot be appended")]
    NotAppendable(String),

    /// Strict mode: a field no kind knows about.
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    /// Strict mode: a known field outside the kind's field set.
    #[error("Field '{field}' is not valid for block type '{kind}'")]
    FieldNotAllowed {
        /// Offending field, as spelled in the request.
        field: String,
        /// Canonical kind name.
        kind: String,
    },

    /// A field the kind cannot do without.
    #[error("Block type '{kind}' requires field '{field}'")]
    MissingField {
        /// Required field, as spelled in the request.
        field: String,
        /// Canonical kind name.
        kind: String,
    },

    /// A field value outside what the kind accepts.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidField {
        /// Offending field.
        field: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// Not an absolute http(s) URL.
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    /// The placement fields that were combined.
    #[error("Placement fields {0} are mutually exclusive")]
    ConflictingPlacement(String),

    /// Strict mode: index past the end of the parent's children.
    #[error("Index {index} is out of range for parent '{parent}' with {len} children")]
    IndexOutOfRange {
        /// Parent id, or the implicit container's kind name.
        parent: String,
        /// Requested index.
        index: i64,
        /// Current number of children.
        len: usize,
    },

    /// A referenced block is not in the document.
    #[error("Block '{0}' not found")]
    BlockNotFound(String),

    /// An after/before reference has no parent to insert into.
    #[error("Block '{0}' has no parent")]
    MissingParent(String),

    /// Strict mode: the parent kind may not hold the child kind.
    #[error("A '{child}' block cannot be placed under a '{parent}' block")]
    InvalidContainment {
        /// Kind being placed.
        child: String,
        /// Kind of the target parent.
        parent: String,
    },

    /// The document lacks the page block.
    #[error("Document has no '{0}' block")]
    MissingRootBlock(String),
}

impl ValidationError {
    /// Variant name, used as the `kind` of a [`SerializableError`].
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedKind(_) => "UnsupportedKind",
            ValidationError::NotAppendable(_) => "NotAppendable",
            ValidationError::UnknownField(_) => "UnknownField",
            ValidationError::FieldNotAllowed { .. } => "FieldNotAllowed",
            ValidationError::MissingField { .. } => "MissingField",
            ValidationError::InvalidField { .. } => "InvalidField",
            ValidationError::InvalidUrl(_) => "InvalidUrl",
            ValidationError::ConflictingPlacement(_) => "ConflictingPlacement",
            ValidationError::IndexOutOfRange { .. } => "IndexOutOfRange",
            ValidationError::BlockNotFound(_) => "BlockNotFound",
            ValidationError::MissingParent(_) => "MissingParent",
            ValidationError::InvalidContainment { .. } => "InvalidContainment",
            ValidationError::MissingRootBlock(_) => "MissingRootBlock",
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Unified error type for blocksync operations
#[derive(Debug, Error)]
pub enum BlocksyncError {
    // Input errors
    /// The request failed local validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Load of the target document returned no snapshot.
    #[error("Document '{0}' not found")]
    DocumentNotFound(String),

    /// The request is not valid JSON for its shape.
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    // Transport errors
    /// No open session within the bound, in milliseconds.
    #[error("Connection timed out after {0} ms")]
    ConnectTimeout(u64),

    /// The WebSocket or Socket.IO handshake failed.
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// No join acknowledgment for the space.
    #[error("Joining space '{0}' timed out")]
    JoinTimeout(String),

    /// The server refused the join.
    #[error("Failed to join space: {0}")]
    JoinFailed(String),

    /// Load acknowledged with an error, malformed, or not at all.
    #[error("Failed to load document: {0}")]
    LoadFailed(String),

    /// Push acknowledged with an error, malformed, or not at all.
    #[error("Failed to push update: {0}")]
    PushFailed(String),

    /// A frame that does not follow the wire format.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server closed the socket mid-request.
    #[error("Connection closed by server")]
    ConnectionClosed,

    // CRDT errors
    /// An update failed to decode or apply.
    #[error("CRDT error: {0}")]
    Crdt(String),

    // IO errors
    /// Local I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config errors
    /// The config file is not valid TOML.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The config could not be written as TOML.
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// No platform config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// A config setting the command needs is unset.
    #[error("Missing setting '{0}'. Set it with 'blocksync config set'.")]
    MissingSetting(&'static str),

    /// The config file exists but could not be read.
    #[error("Failed to read config '{path}': {source}")]
    ConfigRead {
        /// Config file that was read.
        path: PathBuf,
        /// Underlying read error.
        source: std::io::Error,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BlocksyncError>;

impl BlocksyncError {
    /// Whether retrying the whole operation may succeed.
    ///
    /// Network and protocol failures are retryable; nothing in this crate
    /// retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BlocksyncError::ConnectTimeout(_)
                | BlocksyncError::Connect(_)
                | BlocksyncError::JoinTimeout(_)
                | BlocksyncError::JoinFailed(_)
                | BlocksyncError::LoadFailed(_)
                | BlocksyncError::PushFailed(_)
                | BlocksyncError::ConnectionClosed
        )
    }

    /// Convert to a serializable representation for tool callers
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}

/// A serializable representation of BlocksyncError for tool callers
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation may be retried unchanged
    pub retryable: bool,
}

impl From<&BlocksyncError> for SerializableError {
    fn from(err: &BlocksyncError) -> Self {
        let kind = match err {
            BlocksyncError::Validation(inner) => inner.kind(),
            BlocksyncError::DocumentNotFound(_) => "DocumentNotFound",
            BlocksyncError::InvalidRequest(_) => "InvalidRequest",
            BlocksyncError::ConnectTimeout(_) => "ConnectTimeout",
            BlocksyncError::Connect(_) => "Connect",
            BlocksyncError::JoinTimeout(_) => "JoinTimeout",
            BlocksyncError::JoinFailed(_) => "JoinFailed",
            BlocksyncError::LoadFailed(_) => "LoadFailed",
            BlocksyncError::PushFailed(_) => "PushFailed",
            BlocksyncError::Protocol(_) => "Protocol",
            BlocksyncError::ConnectionClosed => "ConnectionClosed",
            BlocksyncError::Crdt(_) => "Crdt",
            BlocksyncError::Io(_) => "Io",
            BlocksyncError::ConfigParse(_) => "ConfigParse",
            BlocksyncError::ConfigSerialize(_) => "ConfigSerialize",
            BlocksyncError::NoConfigDir => "NoConfigDir",
            BlocksyncError::MissingSetting(_) => "MissingSetting",
            BlocksyncError::ConfigRead { .. } => "ConfigRead",
        }
        .to_string();

        Self {
            kind,
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<BlocksyncError> for SerializableError {
    fn from(err: BlocksyncError) -> Self {
        SerializableError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let err = BlocksyncError::from(ValidationError::UnsupportedKind("video".into()));
        assert!(err.is_validation());
        assert!(!err.is_retryable());

        let serialized = err.to_serializable();
        assert_eq!(serialized.kind, "UnsupportedKind");
        assert!(!serialized.retryable);
        assert!(serialized.message.contains("video"));
    }

    #[test]
    fn test_network_errors_are_retryable() {
        for err in [
            BlocksyncError::ConnectTimeout(500),
            BlocksyncError::JoinFailed("denied".into()),
            BlocksyncError::PushFailed("timed out".into()),
        ] {
            assert!(err.is_retryable(), "{err}");
            assert!(!err.is_validation());
        }
    }

    #[test]
    fn test_document_not_found_is_input_error() {
        let err = BlocksyncError::DocumentNotFound("abc".into());
        assert!(err.is_validation());
        assert_eq!(err.to_serializable().kind, "DocumentNotFound");
    }
}
