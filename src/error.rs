use thiserror::Error;

/// Contract violations on core inputs.
///
/// Anything recoverable (an empty extension, an unknown wildcard) is reported
/// as a [`crate::runtime::resolver::Diagnostic`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    #[error("composition space too large: product of dimension sizes exceeds u64")]
    SpaceTooLarge,

    #[error("index {index} out of range for dimension {dimension} of size {size}")]
    IndexOutOfRange {
        dimension: usize,
        index: u64,
        size: u64,
    },

    #[error("expected {expected} indices, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid block path '{0}'")]
    InvalidPath(String),
}
