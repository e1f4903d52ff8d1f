use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity id: {0}")]
    InvalidId(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("cannot parse {value:?} as {expected}")]
    InvalidValue { value: String, expected: String },
}

/// Errors from the single-object JSON codec.
///
/// Type errors are reported per attribute with the offending key, because a
/// silently dropped coercion would corrupt typed data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The document is not a JSON object.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(String),

    /// The `eClass` key names a different class than the decoder context.
    #[error("eClass mismatch: expected {expected}, found {found}")]
    ClassMismatch { expected: String, found: String },

    /// A feature value could not be coerced to its declared type.
    #[error("type mismatch for {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },
}
