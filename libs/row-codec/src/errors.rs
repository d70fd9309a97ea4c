//! Encoder error taxonomy

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("buffer too small: required {required} bytes, available {available}")]
    BufferTooSmall { required: usize, available: usize },

    #[error("column {column}: value is not numeric")]
    NotNumeric { column: String },

    #[error("column {column}: field missing from record")]
    MissingField { column: String },

    #[error("column {column}: {reason}")]
    Field { column: String, reason: String },

    #[error("column {column} overruns the row view: offset {offset}, end {end}, view {view_len}")]
    Overrun {
        column: String,
        offset: usize,
        end: usize,
        view_len: usize,
    },

    #[error("buffer of {len} bytes is not a whole number of {row_width}-byte rows")]
    Misaligned { len: usize, row_width: usize },
}
