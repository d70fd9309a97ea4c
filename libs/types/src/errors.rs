//! Error types for schema construction
//!
//! Schemas are validated once, when built. A schema that passes these
//! checks is safe to hand to the encoder for the lifetime of a feed.

use thiserror::Error;

/// Schema validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema has no columns")]
    Empty,

    #[error("column {index} has an empty id")]
    EmptyId { index: usize },

    #[error("duplicate column id: {id}")]
    DuplicateId { id: String },

    #[error("text column {id} has zero byte size")]
    ZeroWidthText { id: String },

    #[error("column {id} is not a field the record supplies")]
    UnknownField { id: String },
}
