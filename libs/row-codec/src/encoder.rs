//! Schema-driven row encoder
//!
//! Writes `records.len()` rows of `row_width` bytes into the front of a
//! caller-owned buffer and returns a view over exactly those bytes.
//!
//! Per column, at a running offset:
//! - text columns: UTF-8 bytes, truncated to `size`, remainder zero;
//!   falsy text (empty or missing) is skipped
//! - other columns: the value as a native-endian `f64`, written only when
//!   the value is truthy. A `0.0` is therefore never written and reads
//!   back as the zeroed slot.
//!
//! A failing row (getter error, slot overrun) is logged with its offset
//! and the buffer size, and encoding carries on with the next row.

use feed_types::column::{Column, NUM_SIZE};
use feed_types::schema::Schema;
use feed_types::value::Value;
use tracing::error;

use crate::errors::EncodeError;
use crate::record::Record;

/// Encode `records` into `buffer` using `getter` to read each field.
///
/// The returned view aliases `buffer` and is exactly
/// `records.len() * row_width` bytes long. It is zeroed before any row is
/// written, so skipped slots read back as zero even on a reused buffer.
/// Bytes past the view are left untouched.
pub fn encode<'b, R, G>(
    buffer: &'b mut [u8],
    records: &[R],
    row_width: usize,
    schema: &Schema,
    mut getter: G,
) -> Result<&'b [u8], EncodeError>
where
    G: for<'r> FnMut(&'r R, &Column) -> Result<Value<'r>, EncodeError>,
{
    let required = records.len() * row_width;
    if buffer.len() < required {
        return Err(EncodeError::BufferTooSmall {
            required,
            available: buffer.len(),
        });
    }

    let buffer_len = buffer.len();
    let view = &mut buffer[..required];
    view.fill(0);

    for (row, record) in records.iter().enumerate() {
        let start = row * row_width;
        let mut offset = start;
        if let Err(err) = encode_row(view, record, schema, &mut offset, &mut getter) {
            error!(
                row,
                offset,
                buffer_len,
                error = %err,
                "Row encode failed, skipping row"
            );
        }
    }

    Ok(view)
}

/// Encode records through their own [`Record::value`] accessor.
pub fn encode_records<'b, R: Record>(
    buffer: &'b mut [u8],
    records: &[R],
    row_width: usize,
    schema: &Schema,
) -> Result<&'b [u8], EncodeError> {
    encode(buffer, records, row_width, schema, |record, column| {
        Ok(record.value(column))
    })
}

fn encode_row<'r, R, G>(
    view: &mut [u8],
    record: &'r R,
    schema: &Schema,
    offset: &mut usize,
    getter: &mut G,
) -> Result<(), EncodeError>
where
    G: for<'x> FnMut(&'x R, &Column) -> Result<Value<'x>, EncodeError>,
{
    for column in schema.columns() {
        let value = getter(record, column)?;
        if column.is_text() {
            let size = column.byte_width();
            let slot = slot_mut(view, column, *offset, size)?;
            if value.is_truthy() {
                if let Some(text) = value.as_text() {
                    let bytes = text.as_bytes();
                    let len = bytes.len().min(size);
                    slot[..len].copy_from_slice(&bytes[..len]);
                }
            }
            *offset += size;
        } else {
            let slot = slot_mut(view, column, *offset, NUM_SIZE)?;
            if value.is_truthy() {
                let number = value.as_number().ok_or_else(|| EncodeError::NotNumeric {
                    column: column.id.clone(),
                })?;
                slot.copy_from_slice(&number.to_ne_bytes());
            }
            *offset += NUM_SIZE;
        }
    }
    Ok(())
}

fn slot_mut<'v>(
    view: &'v mut [u8],
    column: &Column,
    offset: usize,
    width: usize,
) -> Result<&'v mut [u8], EncodeError> {
    let end = offset + width;
    let view_len = view.len();
    view.get_mut(offset..end).ok_or_else(|| EncodeError::Overrun {
        column: column.id.clone(),
        offset,
        end,
        view_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Row;
    use feed_types::schema::calc_row_width;

    fn price_sym_schema() -> Schema {
        Schema::new(vec![
            Column::number("price", "Price"),
            Column::text("sym", "Symbol", 4),
        ])
        .unwrap()
    }

    fn read_f64(bytes: &[u8]) -> f64 {
        let mut raw = [0u8; NUM_SIZE];
        raw.copy_from_slice(&bytes[..NUM_SIZE]);
        f64::from_ne_bytes(raw)
    }

    #[test]
    fn test_end_to_end_price_and_symbol() {
        let schema = price_sym_schema();
        let width = calc_row_width(&schema);
        assert_eq!(width, 12);

        let rows = vec![Row::new().with("price", 1.5).with("sym", "BTC")];
        let mut buffer = vec![0u8; 12];
        let view = encode_records(&mut buffer, &rows, width, &schema).unwrap();

        assert_eq!(view.len(), 12);
        assert_eq!(read_f64(&view[0..8]), 1.5);
        assert_eq!(&view[8..12], b"BTC\0");
    }

    #[test]
    fn test_text_truncated_to_size() {
        let schema = price_sym_schema();
        let rows = vec![Row::new().with("price", 2.0).with("sym", "DOGE/USD")];
        let mut buffer = vec![0u8; 12];
        let view = encode_records(&mut buffer, &rows, 12, &schema).unwrap();
        assert_eq!(&view[8..12], b"DOGE");
    }

    #[test]
    fn test_zero_is_not_written() {
        let schema = price_sym_schema();
        let rows = vec![Row::new().with("price", 0.0).with("sym", "")];
        let mut buffer = vec![0xAAu8; 12];
        let view = encode_records(&mut buffer, &rows, 12, &schema).unwrap();
        assert!(view.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_reused_buffer_is_cleared_and_tail_untouched() {
        let schema = price_sym_schema();
        let mut buffer = vec![0xFFu8; 36];

        let rows = vec![Row::new().with("sym", "A")];
        let view = encode_records(&mut buffer, &rows, 12, &schema).unwrap();
        assert_eq!(view.len(), 12);
        assert_eq!(&view[..8], &[0u8; 8]);
        assert_eq!(&view[8..12], b"A\0\0\0");
        assert!(buffer[12..].iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn test_buffer_too_small() {
        let schema = price_sym_schema();
        let rows = vec![Row::new(), Row::new()];
        let mut buffer = vec![0u8; 20];
        let result = encode_records(&mut buffer, &rows, 12, &schema);
        assert_eq!(
            result,
            Err(EncodeError::BufferTooSmall {
                required: 24,
                available: 20
            })
        );
    }

    #[test]
    fn test_failing_row_does_not_abort_buffer() {
        let schema = price_sym_schema();
        let rows = vec![1.0, -1.0, 3.0];
        let mut buffer = vec![0u8; 36];

        let view = encode(&mut buffer, &rows, 12, &schema, |price, column| {
            if *price < 0.0 {
                return Err(EncodeError::Field {
                    column: column.id.clone(),
                    reason: "negative price".to_string(),
                });
            }
            match column.id.as_str() {
                "price" => Ok(Value::Number(*price)),
                _ => Ok(Value::from("X")),
            }
        })
        .unwrap();

        assert_eq!(view.len(), 36);
        assert_eq!(read_f64(&view[0..8]), 1.0);
        assert!(view[12..24].iter().all(|b| *b == 0));
        assert_eq!(read_f64(&view[24..32]), 3.0);
        assert_eq!(&view[32..36], b"X\0\0\0");
    }

    #[test]
    fn test_getter_closure_keeps_state() {
        let schema = Schema::new(vec![
            Column::number("size", "Size"),
            Column::number("total", "Total"),
        ])
        .unwrap();
        let sizes = vec![1.0, 2.0, 3.0];
        let mut buffer = vec![0u8; 48];

        let mut sum = 0.0;
        let view = encode(&mut buffer, &sizes, 16, &schema, |size, column| {
            Ok(match column.id.as_str() {
                "size" => Value::Number(*size),
                _ => {
                    sum += *size;
                    Value::Number(sum)
                }
            })
        })
        .unwrap();

        assert_eq!(read_f64(&view[8..16]), 1.0);
        assert_eq!(read_f64(&view[24..32]), 3.0);
        assert_eq!(read_f64(&view[40..48]), 6.0);
    }

    #[test]
    fn test_non_numeric_text_in_number_column_fails_row() {
        let schema = price_sym_schema();
        let rows = vec![Row::new().with("price", "n/a").with("sym", "ETH")];
        let mut buffer = vec![0u8; 12];
        let view = encode_records(&mut buffer, &rows, 12, &schema).unwrap();
        // price fails before sym is reached
        assert!(view.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_overrun_is_contained_to_view() {
        let schema = price_sym_schema();
        let rows = vec![Row::new().with("price", 1.0).with("sym", "BTC")];
        let mut buffer = vec![0u8; 16];
        // row width smaller than the schema needs
        let view = encode_records(&mut buffer, &rows, 10, &schema).unwrap();
        assert_eq!(view.len(), 10);
        assert_eq!(read_f64(&view[0..8]), 1.0);
        assert!(buffer[10..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_empty_records() {
        let schema = price_sym_schema();
        let rows: Vec<Row> = Vec::new();
        let mut buffer = Vec::new();
        let view = encode_records(&mut buffer, &rows, 12, &schema).unwrap();
        assert!(view.is_empty());
    }
}
