use thiserror::Error;

/// Failure kinds raised by the project model and the rung engine.
/// Bulk import is the only caller that downgrades a failure (to a logged warning).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum L5xError {
    /// Missing or unreadable template / asset source.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Attribute fails Rockwell naming, boolean, revision or range grammar.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Unresolved name reference (datatype, tag, routine, module, branch).
    #[error("{kind} not found: {name}")]
    Lookup { kind: &'static str, name: String },

    /// Malformed rung text or out-of-range token position.
    #[error("structural error: {0}")]
    Structural(String),

    #[error("alias cycle detected at tag: {0}")]
    CycleDetected(String),

    /// Instruction reference did not select any instruction of the rung.
    #[error("instruction not found: {0}")]
    NotFound(String),
}

pub type L5xResult<T> = Result<T, L5xError>;

impl L5xError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn lookup(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Lookup {
            kind,
            name: name.into(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
