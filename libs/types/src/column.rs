//! Column metadata
//!
//! A column names one field of a record and fixes how many bytes that
//! field occupies in an encoded row. Text-like columns (`String`,
//! `Sparkline`) carry an explicit byte `size`; every other type is an
//! 8-byte IEEE-754 double. Dates and timestamps are epoch milliseconds.

use serde::{Deserialize, Serialize};

/// Width in bytes of every numeric slot.
pub const NUM_SIZE: usize = 8;

/// Logical type of a column. Determines the slot encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Number,
    String,
    Date,
    DateTime,
    Timestamp,
    /// Fixed-width text holding a lookup key for a series the renderer owns.
    Sparkline,
}

impl ColumnType {
    /// Whether values of this type are written as truncated/padded UTF-8.
    pub fn is_text(&self) -> bool {
        matches!(self, ColumnType::String | ColumnType::Sparkline)
    }
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Field id the record must supply.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Slot encoding.
    #[serde(rename = "type")]
    pub col_type: ColumnType,
    /// Byte length of a text slot. Ignored for numeric types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    /// Display precision for numeric columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<usize>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub highlight: bool,
}

impl Column {
    /// Create a column of the given type with no size or precision set.
    pub fn new(id: impl Into<String>, name: impl Into<String>, col_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            col_type,
            size: None,
            precision: None,
            hidden: false,
            highlight: false,
        }
    }

    /// An 8-byte numeric column.
    pub fn number(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ColumnType::Number)
    }

    /// A fixed-width UTF-8 column of `size` bytes.
    pub fn text(id: impl Into<String>, name: impl Into<String>, size: usize) -> Self {
        Self::new(id, name, ColumnType::String).with_size(size)
    }

    /// An epoch-millisecond timestamp column.
    pub fn timestamp(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ColumnType::Timestamp)
    }

    /// A sparkline column: `size` bytes of lookup key.
    pub fn sparkline(id: impl Into<String>, name: impl Into<String>, size: usize) -> Self {
        Self::new(id, name, ColumnType::Sparkline).with_size(size)
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn highlighted(mut self) -> Self {
        self.highlight = true;
        self
    }

    /// Bytes this column occupies in an encoded row.
    ///
    /// Text columns use `size` (zero when unset); all others use [`NUM_SIZE`].
    pub fn byte_width(&self) -> usize {
        if self.col_type.is_text() {
            self.size.unwrap_or(0)
        } else {
            NUM_SIZE
        }
    }

    /// Whether this column is written as text.
    pub fn is_text(&self) -> bool {
        self.col_type.is_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_width_ignores_size() {
        let col = Column::number("price", "Price").with_size(3);
        assert_eq!(col.byte_width(), NUM_SIZE);

        let ts = Column::timestamp("time", "Time");
        assert_eq!(ts.byte_width(), NUM_SIZE);
    }

    #[test]
    fn test_text_width_uses_size() {
        assert_eq!(Column::text("sym", "Symbol", 12).byte_width(), 12);
        assert_eq!(Column::sparkline("spark", "7d", 10).byte_width(), 10);
        assert_eq!(Column::new("sym", "Symbol", ColumnType::String).byte_width(), 0);
    }

    #[test]
    fn test_builder_flags() {
        let col = Column::number("mcap", "Market Cap")
            .with_precision(0)
            .hidden()
            .highlighted();
        assert_eq!(col.precision, Some(0));
        assert!(col.hidden);
        assert!(col.highlight);
    }

    #[test]
    fn test_column_type_serde() {
        let json = serde_json::to_string(&ColumnType::DateTime).unwrap();
        assert_eq!(json, "\"datetime\"");
        let parsed: ColumnType = serde_json::from_str("\"sparkline\"").unwrap();
        assert_eq!(parsed, ColumnType::Sparkline);
    }

    #[test]
    fn test_column_deserialize_defaults() {
        let col: Column =
            serde_json::from_str(r#"{"id":"price","name":"Price","type":"number"}"#).unwrap();
        assert_eq!(col.size, None);
        assert!(!col.hidden);
        assert!(!col.highlight);
        assert_eq!(col.byte_width(), NUM_SIZE);
    }
}
