//! In-memory database driver.
//!
//! [`MemoryDatabase`] is a set of tables with declared columns, an optional
//! auto-increment column and unique keys. It behaves like a MySQL schema as
//! far as the transfer is concerned: unknown columns and duplicate keys are
//! rejected, and auto-increment ids are handed out on insert.
//!
//! [`MemorySource`] exposes a database as a [`SourceReader`] and
//! [`MemoryTarget`] as a [`TargetWriter`]. A target write is staged on a copy
//! of the database and swapped in only when the whole plan succeeded.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::core::traits::{RowSink, SourceReader, TargetWriter};
use crate::core::{Row, SourceCharacter, SqlValue};
use crate::error::{Result, TransferError};
use crate::plan::{apply_plan, TransferPlan, WriteOutcome};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Row>,
    auto_increment: Option<String>,
    next_id: i64,
    unique_keys: Vec<Vec<String>>,
}

impl MemoryTable {
    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    fn key_values<'r>(&self, key: &[String], row: &'r Row) -> Vec<Option<&'r SqlValue>> {
        key.iter().map(|col| row.get(col)).collect()
    }
}

/// A schema held in memory.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    name: String,
    tables: BTreeMap<String, MemoryTable>,
    failing_table: Option<String>,
}

impl MemoryDatabase {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
            failing_table: None,
        }
    }

    /// Add a table with the given columns.
    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                next_id: 1,
                ..Default::default()
            },
        );
        self
    }

    /// Mark a column of an existing table as auto-increment.
    pub fn with_auto_increment(mut self, table: &str, column: &str) -> Self {
        if let Some(t) = self.tables.get_mut(table) {
            t.auto_increment = Some(column.to_string());
        }
        self
    }

    /// Add a unique key over the given columns.
    pub fn with_unique_key(mut self, table: &str, columns: &[&str]) -> Self {
        if let Some(t) = self.tables.get_mut(table) {
            t.unique_keys
                .push(columns.iter().map(|c| c.to_string()).collect());
        }
        self
    }

    /// Make every insert into `table` fail.
    pub fn fail_inserts_into(mut self, table: &str) -> Self {
        self.failing_table = Some(table.to_string());
        self
    }

    /// Schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names of a table, empty when it does not exist.
    pub fn columns(&self, table: &str) -> Vec<String> {
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }

    /// Rows of a table in insert order.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or(&[])
    }

    /// Number of rows in a table.
    pub fn count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    /// Rows of a table whose `column` equals `key`.
    pub fn rows_where(&self, table: &str, column: &str, key: i64) -> Vec<Row> {
        self.rows(table)
            .iter()
            .filter(|row| row.get(column).and_then(SqlValue::as_i64) == Some(key))
            .cloned()
            .collect()
    }

    fn id_by_name(&self, table: &str, name: &str) -> Option<i64> {
        self.rows(table)
            .iter()
            .filter(|row| row.get("name").and_then(SqlValue::as_str) == Some(name))
            .find_map(|row| row.get("id").and_then(SqlValue::as_i64))
    }

    /// Insert a row, enforcing columns, unique keys and auto-increment.
    pub fn insert_row(&mut self, table: &str, row: &Row) -> Result<u64> {
        if self.failing_table.as_deref() == Some(table) {
            return Err(TransferError::query(
                "injected insert failure",
                format!("inserting into {}", table),
            ));
        }

        let t = self.tables.get_mut(table).ok_or_else(|| {
            TransferError::query(
                format!("Table '{}' doesn't exist", table),
                format!("inserting into {}", table),
            )
        })?;

        if let Some(col) = row.column_names().find(|c| !t.has_column(c)) {
            return Err(TransferError::query(
                format!("Unknown column '{}' in 'field list'", col),
                format!("inserting into {}", table),
            ));
        }

        let mut row = row.clone();
        let mut assigned = 0;
        if let Some(col) = t.auto_increment.clone() {
            let id = match row.get(&col).and_then(SqlValue::as_i64) {
                Some(id) if id > 0 => id,
                _ => t.next_id,
            };
            row.set(col, id);
            t.next_id = t.next_id.max(id + 1);
            assigned = id as u64;
        }

        for key in &t.unique_keys {
            let wanted = t.key_values(key, &row);
            if t.rows.iter().any(|existing| t.key_values(key, existing) == wanted) {
                return Err(TransferError::query(
                    format!("Duplicate entry for key ({})", key.join(", ")),
                    format!("inserting into {}", table),
                ));
            }
        }

        t.rows.push(row);
        Ok(assigned)
    }
}

#[async_trait]
impl RowSink for MemoryDatabase {
    async fn insert(&mut self, table: &str, row: &Row) -> Result<u64> {
        self.insert_row(table, row)
    }
}

/// Read-only view of a [`MemoryDatabase`].
pub struct MemorySource {
    db: MemoryDatabase,
}

impl MemorySource {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.db.columns(table))
    }

    async fn find_characters(&self, name: &str) -> Result<Vec<SourceCharacter>> {
        self.db
            .rows("character_data")
            .iter()
            .filter(|row| row.get("name").and_then(SqlValue::as_str) == Some(name))
            .map(|row| {
                let field = |col: &str| {
                    row.get(col).and_then(SqlValue::as_i64).ok_or_else(|| {
                        TransferError::InvalidRecord(format!(
                            "character_data row for '{}' has no {}",
                            name, col
                        ))
                    })
                };
                Ok(SourceCharacter {
                    id: field("id")?,
                    account_id: field("account_id")?,
                    name: name.to_string(),
                })
            })
            .collect()
    }

    async fn read_rows(
        &self,
        table: &str,
        columns: &[&str],
        key_column: &str,
        key: i64,
    ) -> Result<Vec<Row>> {
        self.db
            .rows_where(table, key_column, key)
            .iter()
            .map(|row| {
                columns.iter().try_fold(Row::new(), |out, col| -> Result<Row> {
                    let value = row.get(col).cloned().ok_or_else(|| {
                        TransferError::query(
                            format!("Unknown column '{}'", col),
                            format!("reading {}", table),
                        )
                    })?;
                    Ok(out.with(*col, value))
                })
            })
            .collect()
    }

    fn database(&self) -> &str {
        self.db.name()
    }

    async fn close(&self) {}
}

/// Destination backed by a [`MemoryDatabase`].
pub struct MemoryTarget {
    name: String,
    db: Mutex<MemoryDatabase>,
}

impl MemoryTarget {
    pub fn new(db: MemoryDatabase) -> Self {
        Self {
            name: db.name().to_string(),
            db: Mutex::new(db),
        }
    }

    /// Copy of the current committed state.
    pub fn snapshot(&self) -> MemoryDatabase {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryDatabase> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.lock().columns(table))
    }

    async fn find_character_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.lock().id_by_name("character_data", name))
    }

    async fn find_account_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.lock().id_by_name("account", name))
    }

    async fn write_plan(&self, plan: &TransferPlan) -> Result<WriteOutcome> {
        let mut staged = self.snapshot();
        let outcome = apply_plan(&mut staged, plan).await?;
        *self.lock() = staged;
        debug!("Committed '{}' to {}", plan.character_name, self.name);
        Ok(outcome)
    }

    fn database(&self) -> &str {
        &self.name
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> MemoryDatabase {
        MemoryDatabase::new("peq")
            .with_table("character_data", &["id", "name"])
            .with_auto_increment("character_data", "id")
            .with_table("inventory", &["character_id", "slot_id"])
            .with_unique_key("inventory", &["character_id", "slot_id"])
    }

    #[test]
    fn test_auto_increment_assigns_sequential_ids() {
        let mut db = db();
        assert_eq!(db.insert_row("character_data", &Row::new().with("name", "a")).unwrap(), 1);
        assert_eq!(db.insert_row("character_data", &Row::new().with("name", "b")).unwrap(), 2);
        assert_eq!(
            db.insert_row("character_data", &Row::new().with("id", 10).with("name", "c"))
                .unwrap(),
            10
        );
        assert_eq!(db.insert_row("character_data", &Row::new().with("name", "d")).unwrap(), 11);
        assert_eq!(db.id_by_name("character_data", "b"), Some(2));
    }

    #[test]
    fn test_unique_key_rejects_duplicates() {
        let mut db = db();
        let row = Row::new().with("character_id", 1).with("slot_id", 33);
        assert_eq!(db.insert_row("inventory", &row).unwrap(), 0);
        assert!(db.insert_row("inventory", &row).is_err());
        assert_eq!(db.count("inventory"), 1);
    }

    #[test]
    fn test_unknown_table_and_column_rejected() {
        let mut db = db();
        assert!(db.insert_row("nope", &Row::new()).is_err());
        assert!(db
            .insert_row("character_data", &Row::new().with("boatid", 1))
            .is_err());
    }

    #[test]
    fn test_injected_failure() {
        let mut db = db().fail_inserts_into("inventory");
        let row = Row::new().with("character_id", 1).with("slot_id", 33);
        assert!(matches!(
            db.insert_row("inventory", &row),
            Err(TransferError::Query { .. })
        ));
    }

    #[tokio::test]
    async fn test_source_finds_characters_by_exact_name() {
        let mut db = MemoryDatabase::new("takp")
            .with_table("character_data", &["id", "account_id", "name"]);
        db.insert_row(
            "character_data",
            &Row::new().with("id", 7).with("account_id", 3).with("name", "Fippy"),
        )
        .unwrap();

        let source = MemorySource::new(db);
        let found = source.find_characters("Fippy").await.unwrap();
        assert_eq!(
            found,
            vec![SourceCharacter {
                id: 7,
                account_id: 3,
                name: "Fippy".into()
            }]
        );
        assert!(source.find_characters("fippy").await.unwrap().is_empty());
        assert!(source.table_columns("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_reads_only_requested_columns() {
        let mut db = MemoryDatabase::new("takp")
            .with_table("account", &["id", "name", "suspendeduntil", "mule"]);
        db.insert_row(
            "account",
            &Row::new()
                .with("id", 3)
                .with("name", "fippyacct")
                .with("suspendeduntil", "0000-00-00 00:00:00")
                .with("mule", 0),
        )
        .unwrap();

        let source = MemorySource::new(db);
        let rows = source
            .read_rows("account", &["id", "suspendeduntil"], "id", 3)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].column_names().collect::<Vec<_>>(),
            vec!["id", "suspendeduntil"]
        );

        let err = source
            .read_rows("account", &["id", "gminvul"], "id", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Query { .. }));
    }
}
