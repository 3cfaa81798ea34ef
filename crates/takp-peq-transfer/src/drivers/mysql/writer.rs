//! PEQ destination writer.
//!
//! Implements the `TargetWriter` trait using mysql_async. A plan is written
//! through one `Transaction`: it is committed only after every insert
//! succeeded and rolled back otherwise.

use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use mysql_async::prelude::*;
use mysql_async::{
    Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, SslOpts, Transaction, TxOpts,
    Value,
};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::core::identifier::quote_mysql;
use crate::core::traits::{RowSink, TargetWriter};
use crate::core::{Row, SqlValue};
use crate::error::{Result, TransferError};
use crate::plan::{apply_plan, TransferPlan, WriteOutcome};

/// MySQL destination writer implementation using mysql_async.
pub struct MysqlWriter {
    pool: Pool,
    database: String,
}

impl MysqlWriter {
    /// Connect to the destination database.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" => {
                Some(SslOpts::default().with_danger_skip_domain_validation(true))
            }
            "verify-full" | "verify_identity" => Some(SslOpts::default()),
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to Preferred",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let constraints = PoolConstraints::new(1, 2)
            .ok_or_else(|| TransferError::Config("invalid pool constraints".into()))?;
        let opts: Opts = builder
            .pool_opts(PoolOpts::new().with_constraints(constraints))
            .into();
        let pool = Pool::new(opts);

        // Test connection
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| TransferError::connection(e, "creating MySQL target pool"))?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| TransferError::connection(e, "testing MySQL target connection"))?;
        drop(conn);

        info!("Connected to target database: {}", config.display_url());

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    async fn lookup_id(&self, sql: &str, name: &str, context: &str) -> Result<Option<i64>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| TransferError::connection(e, context.to_string()))?;
        conn.exec_first::<i64, _, _>(sql, (name,))
            .await
            .map_err(|e| TransferError::query(e, context.to_string()))
    }
}

#[async_trait]
impl TargetWriter for MysqlWriter {
    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| TransferError::connection(e, "loading target columns"))?;

        conn.exec(
            "SELECT CAST(COLUMN_NAME AS CHAR(255)) \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
            (self.database.as_str(), table),
        )
        .await
        .map_err(|e| TransferError::query(e, format!("loading columns of {}", table)))
    }

    async fn find_character_id(&self, name: &str) -> Result<Option<i64>> {
        self.lookup_id(
            "SELECT CAST(id AS SIGNED) FROM character_data WHERE name = ? LIMIT 1",
            name,
            "looking up target character",
        )
        .await
    }

    async fn find_account_id(&self, name: &str) -> Result<Option<i64>> {
        self.lookup_id(
            "SELECT CAST(id AS SIGNED) FROM account WHERE name = ? ORDER BY id LIMIT 1",
            name,
            "looking up target account",
        )
        .await
    }

    async fn write_plan(&self, plan: &TransferPlan) -> Result<WriteOutcome> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| TransferError::connection(e, "getting MySQL connection for write"))?;

        let mut tx = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| TransferError::transaction("START TRANSACTION", e))?;

        match apply_plan(&mut tx, plan).await {
            Ok(outcome) => {
                tx.commit()
                    .await
                    .map_err(|e| TransferError::transaction("COMMIT", e))?;
                Ok(outcome)
            }
            Err(e) => {
                warn!("Rolling back transfer of '{}': {}", plan.character_name, e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn close(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            warn!("Error closing target pool: {}", e);
        }
    }
}

#[async_trait]
impl<'t> RowSink for Transaction<'t> {
    async fn insert(&mut self, table: &str, row: &Row) -> Result<u64> {
        let sql = insert_statement(table, row)?;
        let params: Vec<Value> = row.values().map(to_mysql_value).collect();

        self.exec_drop(sql, Params::Positional(params))
            .await
            .map_err(|e| TransferError::query(e, format!("inserting into {}", table)))?;

        Ok(self.last_insert_id().unwrap_or(0))
    }
}

/// Build `INSERT INTO t (cols...) VALUES (?...)` for a row.
fn insert_statement(table: &str, row: &Row) -> Result<String> {
    let columns = row
        .column_names()
        .map(quote_mysql)
        .collect::<Result<Vec<_>>>()?;
    let placeholders = vec!["?"; columns.len()];

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_mysql(table)?,
        columns.join(", "),
        placeholders.join(", ")
    ))
}

/// Convert a SqlValue to a mysql_async Value.
fn to_mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::I64(v) => Value::Int(*v),
        SqlValue::U64(v) => Value::UInt(*v),
        SqlValue::F64(v) => Value::Double(*v),
        SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
        SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
        SqlValue::Date(d) => Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        SqlValue::DateTime(dt) => Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            micros(dt.nanosecond()),
        ),
        SqlValue::Time(t) => Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            micros(t.nanosecond()),
        ),
    }
}

/// chrono encodes leap seconds as nanoseconds past 1e9.
fn micros(nanos: u32) -> u32 {
    (nanos / 1_000).min(999_999)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_insert_statement_quotes_identifiers() {
        let row = Row::new()
            .with("id", 1)
            .with("int", 75)
            .with("RestTimer", 0);
        assert_eq!(
            insert_statement("character_data", &row).unwrap(),
            "INSERT INTO `character_data` (`id`, `int`, `RestTimer`) VALUES (?, ?, ?)"
        );
    }

    #[test]
    fn test_to_mysql_value() {
        assert_eq!(to_mysql_value(&SqlValue::Null), Value::NULL);
        assert_eq!(to_mysql_value(&SqlValue::I64(-3)), Value::Int(-3));
        assert_eq!(to_mysql_value(&SqlValue::U64(3)), Value::UInt(3));
        assert_eq!(
            to_mysql_value(&SqlValue::Text("Fippy".into())),
            Value::Bytes(b"Fippy".to_vec())
        );

        let dt = NaiveDate::from_ymd_opt(2001, 3, 14)
            .unwrap()
            .and_hms_micro_opt(9, 26, 53, 589_793)
            .unwrap();
        assert_eq!(
            to_mysql_value(&SqlValue::DateTime(dt)),
            Value::Date(2001, 3, 14, 9, 26, 53, 589_793)
        );

        let t = NaiveTime::from_hms_opt(23, 59, 1).unwrap();
        assert_eq!(to_mysql_value(&SqlValue::Time(t)), Value::Time(false, 0, 23, 59, 1, 0));
    }
}
