//! TAKP source reader.
//!
//! Implements the `SourceReader` trait over an SQLx MySQL pool. Every session
//! is switched to read-only transactions as it connects so the source schema
//! cannot be modified through this reader.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::error::UnexpectedNullError;
use sqlx::mysql::{
    MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode,
};
use sqlx::{Column as _, Connection as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::identifier::quote_mysql;
use crate::core::traits::SourceReader;
use crate::core::{Row, SourceCharacter, SqlValue};
use crate::error::{Result, TransferError};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// MySQL/MariaDB source reader implementation.
pub struct MysqlReader {
    pool: MySqlPool,
    database: String,
}

impl MysqlReader {
    /// Connect to the source database.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode(&config.ssl_mode));

        // A pool only reports "timed out" when every attempt fails, so connect
        // once directly to surface the underlying error.
        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| TransferError::connection(e, "connecting to MySQL source"))?;
        if let Err(e) = conn.close().await {
            debug!("Error closing initial source connection: {}", e);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET SESSION TRANSACTION READ ONLY")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(|e| TransferError::connection(e, "creating MySQL source pool"))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| TransferError::connection(e, "testing MySQL source connection"))?;

        info!("Connected to source database: {}", config.display_url());

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// Convert an SQLx row into a [`Row`], decoding by column type.
    fn convert_row(row: &MySqlRow, table: &str) -> Result<Row> {
        let mut out = Row::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let type_name = column.type_info().name().to_uppercase();
            let value = Self::decode_value(row, idx, &type_name).map_err(|e| {
                TransferError::query(
                    e,
                    format!("decoding {}.{} ({})", table, column.name(), type_name),
                )
            })?;
            out.set(column.name(), value);
        }
        Ok(out)
    }

    fn decode_value(row: &MySqlRow, idx: usize, type_name: &str) -> sqlx::Result<SqlValue> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(SqlValue::Null);
        }

        let value = match type_name {
            // tinyint(1) reports BOOLEAN whether or not it is UNSIGNED
            "BOOLEAN" => {
                decode_flag(row.try_get::<i64, _>(idx), || row.try_get::<u64, _>(idx))?
            }
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                SqlValue::I64(row.try_get::<i64, _>(idx)?)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => SqlValue::U64(row.try_get::<u64, _>(idx)?),
            "FLOAT" => SqlValue::F64(f64::from(row.try_get::<f32, _>(idx)?)),
            "DOUBLE" => SqlValue::F64(row.try_get::<f64, _>(idx)?),
            "DECIMAL" => SqlValue::Decimal(row.try_get::<rust_decimal::Decimal, _>(idx)?),
            "DATE" => zero_date_or(
                type_name,
                row.try_get::<chrono::NaiveDate, _>(idx).map(SqlValue::Date),
            )?,
            "TIME" => SqlValue::Time(row.try_get::<chrono::NaiveTime, _>(idx)?),
            "DATETIME" | "TIMESTAMP" => zero_date_or(
                type_name,
                row.try_get::<chrono::NaiveDateTime, _>(idx)
                    .map(SqlValue::DateTime),
            )?,
            "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM"
            | "SET" | "JSON" => SqlValue::Text(row.try_get::<String, _>(idx)?),
            "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?)
            }
            // YEAR, BIT and anything newer: take the first representation that decodes
            _ => row
                .try_get::<i64, _>(idx)
                .map(SqlValue::I64)
                .or_else(|_| row.try_get::<u64, _>(idx).map(SqlValue::U64))
                .or_else(|_| row.try_get::<String, _>(idx).map(SqlValue::Text))
                .or_else(|_| row.try_get::<Vec<u8>, _>(idx).map(SqlValue::Bytes))?,
        };
        Ok(value)
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        // CAST to CHAR to handle collation differences
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TransferError::query(e, format!("loading columns of {}", table)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("COLUMN_NAME")
                    .map_err(|e| TransferError::query(e, "reading column name"))
            })
            .collect()
    }

    async fn find_characters(&self, name: &str) -> Result<Vec<SourceCharacter>> {
        let query = r#"
            SELECT CAST(id AS SIGNED) AS id,
                   CAST(account_id AS SIGNED) AS account_id,
                   CAST(name AS CHAR(64)) AS name
            FROM character_data
            WHERE name = ?
            ORDER BY id
        "#;

        let rows: Vec<MySqlRow> = sqlx::query(query)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TransferError::query(e, "looking up source character"))?;

        rows.iter()
            .map(|row| {
                Ok(SourceCharacter {
                    id: row.try_get("id")?,
                    account_id: row.try_get("account_id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(|e| TransferError::query(e, "decoding source character"))
    }

    async fn read_rows(
        &self,
        table: &str,
        columns: &[&str],
        key_column: &str,
        key: i64,
    ) -> Result<Vec<Row>> {
        let sql = select_statement(table, columns, key_column)?;

        let rows: Vec<MySqlRow> = sqlx::query(&sql)
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TransferError::query(e, format!("reading {}", table)))?;

        debug!("{}: read {} row(s) for {} = {}", table, rows.len(), key_column, key);

        rows.iter().map(|row| Self::convert_row(row, table)).collect()
    }

    fn database(&self) -> &str {
        &self.database
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Build `SELECT cols... FROM t WHERE key = ?`.
fn select_statement(table: &str, columns: &[&str], key_column: &str) -> Result<String> {
    let columns = columns
        .iter()
        .map(|c| quote_mysql(c))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "SELECT {} FROM {} WHERE {} = ?",
        columns.join(", "),
        quote_mysql(table)?,
        quote_mysql(key_column)?
    ))
}

/// Decode a BOOLEAN column, which may be signed or unsigned.
fn decode_flag(
    signed: sqlx::Result<i64>,
    unsigned: impl FnOnce() -> sqlx::Result<u64>,
) -> sqlx::Result<SqlValue> {
    match signed {
        Ok(v) => Ok(SqlValue::I64(v)),
        Err(_) => unsigned().map(SqlValue::U64),
    }
}

/// Keep a zero DATE/DATETIME as its literal text.
///
/// MySQL sends `0000-00-00` with an empty payload, which chrono cannot
/// represent and sqlx reports as an unexpected NULL. The literal is written
/// back unchanged so NOT NULL destination columns keep their zero value.
fn zero_date_or(type_name: &str, decoded: sqlx::Result<SqlValue>) -> sqlx::Result<SqlValue> {
    let err = match decoded {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let unexpected_null = match &err {
        sqlx::Error::ColumnDecode { source, .. } | sqlx::Error::Decode(source) => {
            source.is::<UnexpectedNullError>()
        }
        _ => false,
    };

    match (unexpected_null, zero_date(type_name)) {
        (true, Some(zero)) => Ok(SqlValue::Text(zero.to_string())),
        _ => Err(err),
    }
}

fn zero_date(type_name: &str) -> Option<&'static str> {
    match type_name {
        "DATE" => Some("0000-00-00"),
        "DATETIME" | "TIMESTAMP" => Some("0000-00-00 00:00:00"),
        _ => None,
    }
}

fn ssl_mode(mode: &str) -> MySqlSslMode {
    match mode.to_lowercase().as_str() {
        "disable" => {
            warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
            MySqlSslMode::Disabled
        }
        "require" => MySqlSslMode::Required,
        "verify-ca" | "verify_ca" => MySqlSslMode::VerifyCa,
        "verify-full" | "verify_identity" => MySqlSslMode::VerifyIdentity,
        _ => MySqlSslMode::Preferred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(ssl_mode("disable"), MySqlSslMode::Disabled));
        assert!(matches!(ssl_mode("REQUIRE"), MySqlSslMode::Required));
        assert!(matches!(ssl_mode("verify_ca"), MySqlSslMode::VerifyCa));
        assert!(matches!(ssl_mode("verify-full"), MySqlSslMode::VerifyIdentity));
        assert!(matches!(ssl_mode("prefer"), MySqlSslMode::Preferred));
    }

    fn unexpected_null() -> sqlx::Error {
        sqlx::Error::ColumnDecode {
            index: "17".into(),
            source: Box::new(UnexpectedNullError),
        }
    }

    fn mismatched() -> sqlx::Error {
        sqlx::Error::ColumnDecode {
            index: "3".into(),
            source: "mismatched types; Rust type `i64` is not compatible with SQL type `BOOLEAN`"
                .into(),
        }
    }

    #[test]
    fn test_select_statement_lists_only_mapped_columns() {
        assert_eq!(
            select_statement("account", &["id", "name", "suspendeduntil"], "id").unwrap(),
            "SELECT `id`, `name`, `suspendeduntil` FROM `account` WHERE `id` = ?"
        );
    }

    #[test]
    fn test_select_statement_rejects_bad_identifier() {
        assert!(select_statement("account", &["name; DROP"], "id").is_err());
    }

    #[test]
    fn test_zero_datetime_is_kept_as_text() {
        let value = zero_date_or("DATETIME", Err(unexpected_null())).unwrap();
        assert_eq!(value, SqlValue::Text("0000-00-00 00:00:00".into()));

        let value = zero_date_or("TIMESTAMP", Err(unexpected_null())).unwrap();
        assert_eq!(value, SqlValue::Text("0000-00-00 00:00:00".into()));
    }

    #[test]
    fn test_zero_date_is_kept_as_text() {
        let value = zero_date_or("DATE", Err(unexpected_null())).unwrap();
        assert_eq!(value, SqlValue::Text("0000-00-00".into()));
    }

    #[test]
    fn test_valid_date_passes_through() {
        let dt = chrono::NaiveDate::from_ymd_opt(2003, 7, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let value = zero_date_or("DATETIME", Ok(SqlValue::DateTime(dt))).unwrap();
        assert_eq!(value, SqlValue::DateTime(dt));
    }

    #[test]
    fn test_other_date_errors_still_fail() {
        assert!(zero_date_or("DATETIME", Err(mismatched())).is_err());
        assert!(zero_date_or("TIME", Err(unexpected_null())).is_err());
    }

    #[test]
    fn test_signed_boolean_decodes_as_i64() {
        let value = decode_flag(Ok(1), || panic!("unsigned decode not needed")).unwrap();
        assert_eq!(value, SqlValue::I64(1));
    }

    #[test]
    fn test_unsigned_boolean_falls_back_to_u64() {
        let value = decode_flag(Err(mismatched()), || Ok(1)).unwrap();
        assert_eq!(value, SqlValue::U64(1));
    }

    #[test]
    fn test_boolean_fails_when_neither_decodes() {
        assert!(decode_flag(Err(mismatched()), || Err(mismatched())).is_err());
    }
}
