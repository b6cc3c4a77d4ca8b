//! Error types shared by the document substrate and the extractors

use crate::document::{ElementKind, SpanId};

/// Errors that can occur while reading or editing sub-elements
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The element's span no longer yields a full match under its own grammar
    #[error("{kind} text does not match its grammar: {text:?}")]
    GrammarMismatch { kind: ElementKind, text: String },

    /// Direct item access with an out-of-range index
    #[error("index {index} is out of range for {len} items")]
    InvalidIndex { index: usize, len: usize },

    /// A list marker that cannot be compiled into a grammar
    #[error("invalid list marker {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The element's span was removed from the registry by an enclosing edit
    #[error("span {0:?} is no longer registered")]
    Deregistered(SpanId),

    /// A relative range that falls outside the element or off a char boundary
    #[error("range {start}..{end} is invalid for an element of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
