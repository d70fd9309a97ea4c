//! Property tests for the row encoder
//!
//! Covers the layout guarantees the renderer relies on:
//! - the view is exactly `rows × width` bytes
//! - long text is cut to the column size, short text is zero padded
//! - falsy numbers (0, NaN) leave the slot zeroed

use feed_types::column::{Column, NUM_SIZE};
use feed_types::schema::{calc_row_width, Schema};
use proptest::prelude::*;
use row_codec::{encode_records, Row, RowBuffer, RowReader};

fn mixed_schema(text_size: usize) -> Schema {
    Schema::new(vec![
        Column::number("price", "Price"),
        Column::text("sym", "Symbol", text_size),
        Column::timestamp("time", "Time"),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn prop_view_length_is_rows_times_width(
        rows in 0usize..64,
        text_size in 1usize..24,
        slack in 0usize..64,
    ) {
        let schema = mixed_schema(text_size);
        let width = calc_row_width(&schema);
        let records: Vec<Row> = (0..rows)
            .map(|i| Row::new().with("price", i as f64 + 0.5).with("sym", "ABC"))
            .collect();

        let mut buffer = vec![0u8; rows * width + slack];
        let view = encode_records(&mut buffer, &records, width, &schema).unwrap();
        prop_assert_eq!(view.len(), rows * width);
    }

    #[test]
    fn prop_text_truncated_or_padded(
        text in "[A-Za-z0-9/]{0,32}",
        size in 1usize..16,
    ) {
        let schema = mixed_schema(size);
        let width = calc_row_width(&schema);
        let records = vec![Row::new().with("sym", text.clone())];
        let mut buffer = vec![0xEEu8; width];
        let view = encode_records(&mut buffer, &records, width, &schema).unwrap();

        let slot = &view[NUM_SIZE..NUM_SIZE + size];
        let bytes = text.as_bytes();
        let kept = bytes.len().min(size);
        prop_assert_eq!(&slot[..kept], &bytes[..kept]);
        prop_assert!(slot[kept..].iter().all(|b| *b == 0));
    }

    #[test]
    fn prop_falsy_numbers_leave_slot_zeroed(
        use_nan in any::<bool>(),
        truthy in -1.0e9f64..1.0e9,
    ) {
        prop_assume!(truthy != 0.0);
        let schema = mixed_schema(4);
        let width = calc_row_width(&schema);
        let falsy = if use_nan { f64::NAN } else { 0.0 };
        let records = vec![
            Row::new().with("price", falsy).with("time", truthy),
        ];

        let mut buf = RowBuffer::with_rows(1, width);
        let view = buf.encode_records(&records, &schema).unwrap();
        prop_assert!(view[..NUM_SIZE].iter().all(|b| *b == 0));

        let reader = RowReader::new(view, &schema).unwrap();
        prop_assert_eq!(reader.number(0, "time"), Some(truthy));
    }
}

#[test]
fn test_price_symbol_wire_layout() {
    let schema = Schema::new(vec![
        Column::number("price", "Price"),
        Column::text("sym", "Symbol", 4),
    ])
    .unwrap();
    let records = vec![Row::new().with("price", 1.5).with("sym", "BTC")];

    let mut buf = RowBuffer::new();
    let view = buf.encode_records(&records, &schema).unwrap();

    assert_eq!(view.len(), 12);
    assert_eq!(&view[..8], &1.5f64.to_ne_bytes());
    assert_eq!(&view[8..], &[b'B', b'T', b'C', 0]);
}
