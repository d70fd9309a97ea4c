//! Reusable, grow-only encode buffer
//!
//! Feeds own one of these per output stream. Capacity only ever grows;
//! growing replaces the allocation with a fresh zeroed one of at least
//! the requested size. The bytes past the last encoded view are
//! undefined from the consumer's point of view.

use feed_types::column::Column;
use feed_types::schema::{calc_row_width, Schema};
use feed_types::value::Value;
use tracing::debug;

use crate::encoder::{encode, encode_records};
use crate::errors::EncodeError;
use crate::record::Record;

#[derive(Debug, Default)]
pub struct RowBuffer {
    bytes: Vec<u8>,
    /// Number of reallocations since creation.
    generations: u64,
}

impl RowBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for `rows` rows of `row_width` bytes.
    pub fn with_rows(rows: usize, row_width: usize) -> Self {
        Self {
            bytes: vec![0; rows * row_width],
            generations: 1,
        }
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Number of times the backing allocation has been replaced.
    pub fn generations(&self) -> u64 {
        self.generations
    }

    /// Make room for at least `required` bytes. Returns true if the
    /// buffer was reallocated. Never shrinks.
    pub fn ensure_capacity(&mut self, required: usize) -> bool {
        if self.bytes.len() >= required {
            return false;
        }
        debug!(
            old_capacity = self.bytes.len(),
            new_capacity = required,
            "Growing row buffer"
        );
        self.bytes = vec![0; required];
        self.generations += 1;
        true
    }

    /// Grow if needed, then encode `records` with their own accessors.
    pub fn encode_records<R: Record>(
        &mut self,
        records: &[R],
        schema: &Schema,
    ) -> Result<&[u8], EncodeError> {
        let row_width = calc_row_width(schema);
        self.ensure_capacity(records.len() * row_width);
        encode_records(&mut self.bytes, records, row_width, schema)
    }

    /// Grow if needed, then encode `records` through `getter`.
    pub fn encode_with<R, G>(
        &mut self,
        records: &[R],
        schema: &Schema,
        getter: G,
    ) -> Result<&[u8], EncodeError>
    where
        G: for<'r> FnMut(&'r R, &Column) -> Result<Value<'r>, EncodeError>,
    {
        let row_width = calc_row_width(schema);
        self.ensure_capacity(records.len() * row_width);
        encode(&mut self.bytes, records, row_width, schema, getter)
    }

    /// Raw backing bytes, including any stale tail.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Row;

    fn schema() -> Schema {
        Schema::new(vec![Column::number("price", "Price")]).unwrap()
    }

    #[test]
    fn test_grows_only_when_needed() {
        let mut buf = RowBuffer::with_rows(2, 8);
        assert_eq!(buf.capacity(), 16);
        assert!(!buf.ensure_capacity(8));
        assert_eq!(buf.capacity(), 16);

        assert!(buf.ensure_capacity(40));
        assert_eq!(buf.capacity(), 40);
        assert_eq!(buf.generations(), 2);
    }

    #[test]
    fn test_never_shrinks() {
        let mut buf = RowBuffer::new();
        let schema = schema();
        let five: Vec<Row> = (1..=5).map(|i| Row::new().with("price", i as f64)).collect();
        let one = vec![Row::new().with("price", 9.0)];

        assert_eq!(buf.encode_records(&five, &schema).unwrap().len(), 40);
        assert_eq!(buf.capacity(), 40);

        let view = buf.encode_records(&one, &schema).unwrap();
        assert_eq!(view.len(), 8);
        assert_eq!(buf.capacity(), 40);
        assert_eq!(buf.generations(), 1);
    }

    #[test]
    fn test_encode_with_getter() {
        let mut buf = RowBuffer::new();
        let schema = schema();
        let prices = vec![1.25, 2.5];
        let view = buf
            .encode_with(&prices, &schema, |p, _| Ok(Value::Number(*p)))
            .unwrap();
        assert_eq!(view.len(), 16);
        assert_eq!(&view[8..16], &2.5f64.to_ne_bytes());
    }
}
