//! Field values supplied by records to the encoder

use std::borrow::Cow;
use std::fmt;

/// A single field value: a number, a piece of text, or nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    Text(Cow<'a, str>),
    Empty,
}

impl<'a> Value<'a> {
    /// Truthiness used by the encoder's write gate.
    ///
    /// `0`, `NaN`, empty text and `Empty` are falsy. Falsy values are
    /// never written. The encoder zero-fills each row before writing, so
    /// the slot reads back as zero.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Empty => false,
        }
    }

    /// Numeric view. Text is parsed the way a loosely typed caller would
    /// coerce it; unparseable text yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Empty => None,
        }
    }

    /// Text view. Numbers are formatted with their shortest representation.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Text(s) => Some(Cow::Borrowed(s.as_ref())),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Empty => None,
        }
    }

    /// Detach from any borrowed data.
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Number(n) => Value::Number(n),
            Value::Text(s) => Value::Text(Cow::Owned(s.into_owned())),
            Value::Empty => Value::Empty,
        }
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<u64> for Value<'_> {
    fn from(v: u64) -> Self {
        Value::Number(v as f64)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::Text(Cow::Borrowed(v))
    }
}

impl From<String> for Value<'_> {
    fn from(v: String) -> Self {
        Value::Text(Cow::Owned(v))
    }
}

impl<'a, T: Into<Value<'a>>> From<Option<T>> for Value<'a> {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Empty, Into::into)
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Empty => Ok(()),
        }
    }
}
