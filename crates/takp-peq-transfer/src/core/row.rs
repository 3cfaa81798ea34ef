//! Ordered row representation.

use super::value::SqlValue;

/// A single table row: column names paired with values, in column order.
///
/// Column lookups are case-insensitive because MySQL column names are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Row::set`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing any existing value for it.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.position(&column) {
            Some(idx) => self.columns[idx].1 = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.position(column).map(|idx| &self.columns[idx].1)
    }

    /// Remove a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        self.position(column).map(|idx| self.columns.remove(idx).1)
    }

    /// Check whether the row has a column.
    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Values in column order.
    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.columns.iter().map(|(_, value)| value)
    }

    /// (column, value) pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_case_insensitively() {
        let mut row = Row::new().with("slotid", 22).with("itemid", 1001);
        row.set("SlotID", 23);

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("slotid"), Some(&SqlValue::I64(23)));
        assert_eq!(row.column_names().collect::<Vec<_>>(), ["slotid", "itemid"]);
    }

    #[test]
    fn test_remove() {
        let mut row = Row::new().with("id", 5).with("name", "Fippy");
        assert_eq!(row.remove("ID"), Some(SqlValue::I64(5)));
        assert!(!row.contains("id"));
        assert_eq!(row.remove("id"), None);
    }
}
