//! Row Codec: binary row encoder
//!
//! Packs records into flat byte buffers laid out by a [`Schema`]:
//! one fixed-width row per record, fields at increasing offsets in
//! column order. The buffers are consumed in place by the external
//! renderer, so the layout is a wire contract:
//! - numeric, date and timestamp fields: 8-byte native-endian `f64`
//! - string and sparkline fields: UTF-8, truncated or zero-padded to `size`
//!
//! [`encode`] writes into caller-owned memory and never allocates.
//! [`RowBuffer`] owns a reusable, grow-only buffer for feeds.
//!
//! [`Schema`]: feed_types::schema::Schema

pub mod buffer;
pub mod encoder;
pub mod errors;
pub mod reader;
pub mod record;

pub use buffer::RowBuffer;
pub use encoder::{encode, encode_records};
pub use errors::EncodeError;
pub use reader::RowReader;
pub use record::{Record, Row, TypedRecord};

/// Crate version constant
pub const ROW_CODEC_VERSION: &str = "1.0.0";
