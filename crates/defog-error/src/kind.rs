//! Error kinds for defog operations

use strum_macros::{Display, IntoStaticStr};

/// The kind of error that occurred.
///
/// This enum categorizes errors to help users write clear error handling logic.
/// Only `ParseFailed` and `StageNotFound` are fatal to an engine call; the
/// remaining kinds surface from helpers whose callers degrade gracefully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// Invalid configuration or parameters
    ConfigInvalid,

    // =========================================================================
    // Parse / input errors
    // =========================================================================
    /// The external inspector produced no tree
    ParseFailed,

    /// Tree payload could not be deserialized
    DeserializationFailed,

    /// Source or literal bytes carry an invalid encoding
    EncodingError,

    // =========================================================================
    // Pipeline errors
    // =========================================================================
    /// A named AST stage is not present in the registry
    StageNotFound,

    /// Symbol not found in scope
    SymbolNotFound,

    // =========================================================================
    // Rewrite errors (rule-local; callers treat these as "not applicable")
    // =========================================================================
    /// Codec name not recognized by the codec registry
    UnknownCodec,

    /// Codec rejected its input (malformed payload)
    DecodeFailed,

    /// Name resolution exceeded the chain-depth bound
    RecursionLimit,

    // =========================================================================
    // Traversal bounds (informational; the tree is still yielded)
    // =========================================================================
    /// Per-pass queue cap was hit and a subtree was dropped
    QueueOverflow,

    /// The pass cap was hit before the tree converged
    IterationLimit,

    // =========================================================================
    // File/IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// Kinds that abort an engine call; everything else degrades gracefully.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::ParseFailed | ErrorKind::StageNotFound)
    }
}
