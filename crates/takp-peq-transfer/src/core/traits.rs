//! Core traits for reading the TAKP schema and writing the PEQ schema.
//!
//! - [`SourceReader`]: read-only access to the source schema
//! - [`TargetWriter`]: lookups and the single transactional write on the
//!   destination schema
//! - [`RowSink`]: anything rows can be inserted into while a write is in
//!   progress (a MySQL transaction, an in-memory staging copy)

use async_trait::async_trait;

use crate::error::Result;
use crate::plan::{TransferPlan, WriteOutcome};

use super::record::SourceCharacter;
use super::row::Row;

/// Read rows from the source database.
///
/// Implementations never modify the source.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Column names of a table, empty when the table does not exist.
    async fn table_columns(&self, table: &str) -> Result<Vec<String>>;

    /// All `character_data` rows whose name matches.
    async fn find_characters(&self, name: &str) -> Result<Vec<SourceCharacter>>;

    /// `columns` of every row of `table` whose `key_column` equals `key`.
    async fn read_rows(
        &self,
        table: &str,
        columns: &[&str],
        key_column: &str,
        key: i64,
    ) -> Result<Vec<Row>>;

    /// Schema name, for messages.
    fn database(&self) -> &str;

    /// Release the connection pool.
    async fn close(&self);
}

/// Write a transfer plan to the destination database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Column names of a table, empty when the table does not exist.
    async fn table_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Id of the destination character with this name, if any.
    async fn find_character_id(&self, name: &str) -> Result<Option<i64>>;

    /// Id of the destination account with this name, if any.
    async fn find_account_id(&self, name: &str) -> Result<Option<i64>>;

    /// Write the whole plan atomically.
    ///
    /// Either every row of the plan is committed or none is; a failed write
    /// is rolled back before the error is returned.
    async fn write_plan(&self, plan: &TransferPlan) -> Result<WriteOutcome>;

    /// Schema name, for messages.
    fn database(&self) -> &str;

    /// Release the connection pool.
    async fn close(&self);
}

/// Destination for rows during a write.
#[async_trait]
pub trait RowSink: Send {
    /// Insert a row and return the auto-increment id it was given, or 0 when
    /// the table assigned none.
    async fn insert(&mut self, table: &str, row: &Row) -> Result<u64>;
}
