//! Records: anything that can answer "what is the value of this column?"

use std::collections::BTreeMap;

use feed_types::column::Column;
use feed_types::errors::SchemaError;
use feed_types::schema::Schema;
use feed_types::value::Value;

/// A record the encoder can read fields from.
pub trait Record {
    /// Value of `column` for this record. Unknown ids yield [`Value::Empty`].
    fn value(&self, column: &Column) -> Value<'_>;
}

/// A record with a fixed, compile-time field set.
pub trait TypedRecord: Record {
    /// Every column id this record can supply.
    const FIELDS: &'static [&'static str];

    /// Build a schema for this record, rejecting ids it cannot supply.
    fn schema(columns: Vec<Column>) -> Result<Schema, SchemaError> {
        Schema::for_fields(columns, Self::FIELDS)
    }
}

/// Dynamic record keyed by column id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, Value<'static>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, id: impl Into<String>, value: impl Into<Value<'static>>) -> Self {
        self.set(id, value);
        self
    }

    pub fn set(&mut self, id: impl Into<String>, value: impl Into<Value<'static>>) {
        self.fields.insert(id.into(), value.into());
    }

    pub fn get(&self, id: &str) -> Option<&Value<'static>> {
        self.fields.get(id)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Record for Row {
    fn value(&self, column: &Column) -> Value<'_> {
        self.fields.get(&column.id).cloned().unwrap_or(Value::Empty)
    }
}
