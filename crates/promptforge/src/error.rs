//! Error types for template parsing and rendering

use thiserror::Error;

/// Engine errors are caller errors: either the template source is broken or
/// the supplied bindings do not satisfy it. They are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A variable was interpolated or iterated without a binding. Absent
    /// variables used only as `{{#if}}` guards do not raise this.
    #[error("missing variable `{name}` (byte {offset})")]
    MissingVariable { name: String, offset: usize },

    /// The template source itself is invalid. `offset` is the byte position
    /// of the first offending tag.
    #[error("malformed template: {message} (byte {offset})")]
    MalformedTemplate { message: String, offset: usize },

    /// `{{#each}}` was applied to a bound value that is not a sequence.
    #[error("variable `{name}` is not iterable (byte {offset})")]
    NotIterable { name: String, offset: usize },
}

impl EngineError {
    /// Byte offset of the offending tag in the template source.
    pub fn offset(&self) -> usize {
        match self {
            EngineError::MissingVariable { offset, .. }
            | EngineError::MalformedTemplate { offset, .. }
            | EngineError::NotIterable { offset, .. } => *offset,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
