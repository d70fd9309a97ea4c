//! Schema model
//!
//! An ordered, non-empty list of columns. Column order is the byte
//! layout: fields are packed one after another, text columns taking
//! their `size` and everything else [`NUM_SIZE`] bytes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnType};
use crate::errors::SchemaError;

/// Validated, immutable column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSchema", into = "RawSchema")]
pub struct Schema {
    cols: Vec<Column>,
}

/// Wire shape of a schema, validated on the way in.
#[derive(Serialize, Deserialize)]
struct RawSchema {
    cols: Vec<Column>,
}

impl TryFrom<RawSchema> for Schema {
    type Error = SchemaError;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        Schema::new(raw.cols)
    }
}

impl From<Schema> for RawSchema {
    fn from(schema: Schema) -> Self {
        RawSchema { cols: schema.cols }
    }
}

/// Position of one column inside an encoded row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSlot {
    pub offset: usize,
    pub width: usize,
}

impl Schema {
    /// Build a schema, rejecting empty lists, empty or duplicate ids and
    /// zero-width text columns.
    pub fn new(cols: Vec<Column>) -> Result<Self, SchemaError> {
        if cols.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = BTreeSet::new();
        for (index, col) in cols.iter().enumerate() {
            if col.id.is_empty() {
                return Err(SchemaError::EmptyId { index });
            }
            if !seen.insert(col.id.as_str()) {
                return Err(SchemaError::DuplicateId { id: col.id.clone() });
            }
            if col.is_text() && col.byte_width() == 0 {
                return Err(SchemaError::ZeroWidthText { id: col.id.clone() });
            }
        }

        Ok(Self { cols })
    }

    /// Build a schema whose column ids must all be in `fields`.
    ///
    /// Used by typed records to catch misspelled column ids up front
    /// instead of silently encoding empty slots.
    pub fn for_fields(cols: Vec<Column>, fields: &[&str]) -> Result<Self, SchemaError> {
        if let Some(col) = cols.iter().find(|c| !fields.contains(&c.id.as_str())) {
            return Err(SchemaError::UnknownField { id: col.id.clone() });
        }
        Self::new(cols)
    }

    /// Columns in layout order.
    pub fn columns(&self) -> &[Column] {
        &self.cols
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    /// Always false for a constructed schema.
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Bytes per encoded row. Recomputed on every call.
    pub fn row_width(&self) -> usize {
        calc_row_width(self)
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.cols.iter().find(|c| c.id == id)
    }

    pub fn column_by_type(&self, col_type: ColumnType) -> Option<&Column> {
        self.cols.iter().find(|c| c.col_type == col_type)
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &Column> {
        self.cols.iter().filter(|c| !c.hidden)
    }

    /// Byte offset of column `id` within a row.
    pub fn offset_of(&self, id: &str) -> Option<usize> {
        self.layout()
            .find(|(col, _)| col.id == id)
            .map(|(_, slot)| slot.offset)
    }

    /// Every column paired with its slot, in layout order.
    pub fn layout(&self) -> impl Iterator<Item = (&Column, ColumnSlot)> {
        self.cols.iter().scan(0usize, |offset, col| {
            let slot = ColumnSlot {
                offset: *offset,
                width: col.byte_width(),
            };
            *offset += slot.width;
            Some((col, slot))
        })
    }
}

/// Sum of column byte widths.
///
/// Pure; never cached, so a schema rebuilt between ticks is always
/// measured afresh.
pub fn calc_row_width(schema: &Schema) -> usize {
    schema.columns().iter().map(Column::byte_width).sum()
}
