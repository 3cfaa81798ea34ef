//! SQL value types shared by the source reader and the destination writer.
//!
//! The reader decodes MySQL columns into [`SqlValue`] and the writer encodes
//! them back into driver parameters, so the two drivers never see each
//! other's types.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Signed integer of any width.
    I64(i64),

    /// Unsigned integer of any width.
    U64(u64),

    /// Floating point (FLOAT is widened).
    F64(f64),

    /// Fixed-point decimal.
    Decimal(Decimal),

    /// Text data (CHAR, VARCHAR, TEXT, ENUM, SET, JSON).
    Text(String),

    /// Binary data (BINARY, VARBINARY, BLOB).
    Bytes(Vec<u8>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),

    /// Timestamp without timezone (DATETIME, TIMESTAMP).
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Interpret the value as a signed integer.
    ///
    /// Integral text is accepted since MySQL happily stores ids in VARCHARs.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I64(v) => Some(*v),
            SqlValue::U64(v) => i64::try_from(*v).ok(),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow the value as a string slice, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::U64(v) => write!(f, "{}", v),
            SqlValue::F64(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "'{}'", v),
            SqlValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            SqlValue::Date(v) => write!(f, "{}", v),
            SqlValue::Time(v) => write!(f, "{}", v),
            SqlValue::DateTime(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I64(v.into())
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_i64_conversions() {
        assert_eq!(SqlValue::I64(-4).as_i64(), Some(-4));
        assert_eq!(SqlValue::U64(42).as_i64(), Some(42));
        assert_eq!(SqlValue::U64(u64::MAX).as_i64(), None);
        assert_eq!(SqlValue::Text(" 17 ".into()).as_i64(), Some(17));
        assert_eq!(SqlValue::Null.as_i64(), None);
        assert_eq!(SqlValue::F64(1.0).as_i64(), None);
    }

    #[test]
    fn test_option_into_null() {
        let none: Option<i64> = None;
        assert!(SqlValue::from(none).is_null());
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(SqlValue::Text("Fippy".into()).to_string(), "'Fippy'");
        assert_eq!(SqlValue::Bytes(vec![1, 2, 3]).to_string(), "<3 bytes>");
        assert_eq!(SqlValue::Null.to_string(), "NULL");
    }
}
