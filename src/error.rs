// ─── Error ──────────────────────────────────────────────────────────────────
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("index {index} out of range for field of size {size}")]
    IndexOutOfRange { index: i64, size: usize },
    #[error("Cannot use message of type {actual} for field of type {expected}")]
    MessageTypeMismatch { expected: SmolStr, actual: SmolStr },
    #[error("Type mismatch: expected {expected}, got {actual}")]
    Conversion {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unknown element kind for declared type tag {0}")]
    UnknownKind(u8),
    #[error("Error copying message: {0}")]
    CopyFailed(String),
    #[error("{message} has no field named '{field}'")]
    FieldNotFound { message: SmolStr, field: String },
    #[error("Field '{0}' cannot be assigned directly")]
    ReadOnlyField(String),
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    #[error("Expected a message, got {0}")]
    NotAMessage(&'static str),
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error("CBOR error: {0}")]
    Cbor(String),
}
