//! Read-side view over an encoded buffer
//!
//! Decodes fields the way the renderer does: numeric slots as
//! native-endian `f64`, text slots as UTF-8 with the zero padding
//! trimmed. Useful for tests, diagnostics and sinks that inspect frames.

use feed_types::column::NUM_SIZE;
use feed_types::schema::{calc_row_width, Schema};

use crate::errors::EncodeError;

pub struct RowReader<'a> {
    data: &'a [u8],
    schema: &'a Schema,
    row_width: usize,
    row_count: usize,
}

impl<'a> RowReader<'a> {
    /// Wrap an encoded view. `data` must hold a whole number of rows.
    pub fn new(data: &'a [u8], schema: &'a Schema) -> Result<Self, EncodeError> {
        let row_width = calc_row_width(schema);
        if row_width == 0 || data.len() % row_width != 0 {
            return Err(EncodeError::Misaligned {
                len: data.len(),
                row_width,
            });
        }
        Ok(Self {
            data,
            schema,
            row_width,
            row_count: data.len() / row_width,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Numeric field `id` of `row`. `None` for out-of-range rows, unknown
    /// ids or text columns.
    pub fn number(&self, row: usize, id: &str) -> Option<f64> {
        let (offset, width, is_text) = self.cell(row, id)?;
        if is_text || width != NUM_SIZE {
            return None;
        }
        let mut raw = [0u8; NUM_SIZE];
        raw.copy_from_slice(&self.data[offset..offset + NUM_SIZE]);
        Some(f64::from_ne_bytes(raw))
    }

    /// Text field `id` of `row` with trailing zero bytes removed.
    pub fn text(&self, row: usize, id: &str) -> Option<String> {
        let (offset, width, is_text) = self.cell(row, id)?;
        if !is_text {
            return None;
        }
        let raw = &self.data[offset..offset + width];
        let s = String::from_utf8_lossy(raw);
        Some(s.trim_end_matches('\0').to_string())
    }

    fn cell(&self, row: usize, id: &str) -> Option<(usize, usize, bool)> {
        if row >= self.row_count {
            return None;
        }
        self.schema
            .layout()
            .find(|(col, _)| col.id == id)
            .map(|(col, slot)| (row * self.row_width + slot.offset, slot.width, col.is_text()))
    }
}
