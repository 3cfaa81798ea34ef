//! Transformed record graph and the routine that writes it.
//!
//! A [`TransferPlan`] holds destination rows with their owner columns left
//! blank. [`apply_plan`] inserts the owners first, captures the ids the
//! destination assigns, and stamps those ids onto every dependent row.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::core::{CharacterRecord, Row, RowSink, SqlValue};
use crate::error::{Result, TransferError};
use crate::mapping::{TableMapping, ACCOUNT, ACCOUNT_IP, CHARACTER_DATA, INVENTORY_TABLE};

/// What to do about the owning account.
#[derive(Debug, Clone)]
pub enum AccountPlan {
    /// The destination already has an account with this name.
    Existing { id: i64 },
    /// Create the account and copy its IP history.
    Create { account: Row, ips: Vec<Row> },
}

/// Destination rows for one mapped table.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub mapping: &'static TableMapping,
    pub rows: Vec<Row>,
    /// Source rows dropped by the mapping's filter.
    pub skipped: usize,
}

/// The complete set of destination writes for one character.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub character_name: String,
    pub source_character_id: i64,
    pub account_name: String,
    pub account: AccountPlan,
    /// Transformed `character_data` row, without `id` and `account_id`.
    pub character: Row,
    /// Dependent tables in write order.
    pub tables: Vec<TablePlan>,
}

/// Ids and counts produced by a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub character_id: i64,
    pub account_id: i64,
    pub account_created: bool,
    pub rows_written: usize,
}

impl TransferPlan {
    /// Transform a source record.
    ///
    /// `existing_account` is the id of a destination account with the same
    /// name as the source account, if one exists.
    pub fn build(record: &CharacterRecord, existing_account: Option<i64>) -> Result<Self> {
        let account_name = record
            .account_name()
            .ok_or_else(|| {
                TransferError::InvalidRecord(format!(
                    "account {} of character '{}' has no name",
                    record.character.account_id, record.character.name
                ))
            })?
            .to_string();

        let account = match existing_account {
            Some(id) => AccountPlan::Existing { id },
            None => {
                let (ips, _) = transform_rows(&ACCOUNT_IP, &record.account_ips)?;
                AccountPlan::Create {
                    account: ACCOUNT.transform(&record.account)?,
                    ips,
                }
            }
        };

        let character = CHARACTER_DATA.transform(&record.data)?;

        let mut tables = Vec::with_capacity(record.tables.len());
        for source in &record.tables {
            let (mut rows, skipped) = transform_rows(source.mapping, &source.rows)?;
            if source.mapping.target_table == INVENTORY_TABLE {
                order_inventory(&mut rows)?;
            }
            if skipped > 0 {
                debug!(
                    "{}: skipping {} row(s) with no {} equivalent",
                    source.mapping.source_table, skipped, source.mapping.target_table
                );
            }
            tables.push(TablePlan {
                mapping: source.mapping,
                rows,
                skipped,
            });
        }

        Ok(Self {
            character_name: record.character.name.clone(),
            source_character_id: record.character.id,
            account_name,
            account,
            character,
            tables,
        })
    }

    /// Number of dependent rows that will be written.
    pub fn dependent_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }

    /// Number of source rows left out by filters.
    pub fn skipped_rows(&self) -> usize {
        self.tables.iter().map(|t| t.skipped).sum()
    }

    /// Row count per destination table.
    pub fn table_counts(&self) -> BTreeMap<String, usize> {
        self.tables
            .iter()
            .map(|t| (t.mapping.target_table.to_string(), t.rows.len()))
            .collect()
    }

    /// Whether applying the plan creates a destination account.
    pub fn creates_account(&self) -> bool {
        matches!(self.account, AccountPlan::Create { .. })
    }
}

/// Insert a plan into a sink, remapping owner columns to the new ids.
///
/// Any failed insert is reported as [`TransferError::Transaction`] naming
/// the table; the caller is responsible for rolling the sink back.
pub async fn apply_plan<S>(sink: &mut S, plan: &TransferPlan) -> Result<WriteOutcome>
where
    S: RowSink + ?Sized,
{
    let (account_id, account_created) = match &plan.account {
        AccountPlan::Existing { id } => (*id, false),
        AccountPlan::Create { account, ips } => {
            let id = insert_owner(sink, ACCOUNT.target_table, account).await?;
            info!("Created account '{}' with id {}", plan.account_name, id);
            for ip in ips {
                insert_owned(sink, &ACCOUNT_IP, ip, id).await?;
            }
            (id, true)
        }
    };

    let mut character = plan.character.clone();
    if let Some(key) = CHARACTER_DATA.target_key {
        character.set(key, account_id);
    }
    let character_id = insert_owner(sink, CHARACTER_DATA.target_table, &character).await?;
    info!(
        "Inserted character '{}' with id {} (source id {})",
        plan.character_name, character_id, plan.source_character_id
    );

    let mut rows_written = 0;
    for table in &plan.tables {
        for row in &table.rows {
            insert_owned(sink, table.mapping, row, character_id).await?;
        }
        debug!("{}: wrote {} row(s)", table.mapping.target_table, table.rows.len());
        rows_written += table.rows.len();
    }

    Ok(WriteOutcome {
        character_id,
        account_id,
        account_created,
        rows_written,
    })
}

async fn insert_owner<S>(sink: &mut S, table: &str, row: &Row) -> Result<i64>
where
    S: RowSink + ?Sized,
{
    let id = sink
        .insert(table, row)
        .await
        .map_err(|e| TransferError::transaction(table, e))?;
    match i64::try_from(id) {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(TransferError::transaction(
            table,
            format!("destination assigned no usable id (got {})", id),
        )),
    }
}

async fn insert_owned<S>(sink: &mut S, mapping: &TableMapping, row: &Row, owner_id: i64) -> Result<()>
where
    S: RowSink + ?Sized,
{
    let mut row = row.clone();
    if let Some(key) = mapping.target_key {
        row.set(key, owner_id);
    }
    sink.insert(mapping.target_table, &row)
        .await
        .map_err(|e| TransferError::transaction(mapping.target_table, e))?;
    Ok(())
}

fn transform_rows(mapping: &TableMapping, rows: &[Row]) -> Result<(Vec<Row>, usize)> {
    let mut out = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        if mapping.accepts(row) {
            out.push(mapping.transform(row)?);
        } else {
            skipped += 1;
        }
    }
    Ok((out, skipped))
}

/// PEQ keys inventory on (character_id, slot_id), so rows go out in slot
/// order and two items landing in one slot are rejected up front.
fn order_inventory(rows: &mut [Row]) -> Result<()> {
    let slot = |row: &Row| row.get("slot_id").and_then(SqlValue::as_i64);
    rows.sort_by_key(|row| slot(row));

    for pair in rows.windows(2) {
        let (a, b) = (slot(&pair[0]), slot(&pair[1]));
        if a == b {
            return Err(TransferError::InvalidRecord(format!(
                "two inventory items map to PEQ slot {}",
                a.map_or_else(|| "NULL".to_string(), |s| s.to_string())
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SourceCharacter, TableRows};
    use crate::mapping::CHARACTER_TABLES;
    use async_trait::async_trait;

    /// Records inserts and hands out sequential ids.
    #[derive(Default)]
    struct RecordingSink {
        next_id: u64,
        inserted: Vec<(String, Row)>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl RowSink for RecordingSink {
        async fn insert(&mut self, table: &str, row: &Row) -> Result<u64> {
            if self.fail_on == Some(table) {
                return Err(TransferError::query("constraint violation", table));
            }
            self.inserted.push((table.to_string(), row.clone()));
            self.next_id += 1;
            Ok(match table {
                "account" => 500 + self.next_id,
                "character_data" => 900 + self.next_id,
                _ => 0,
            })
        }
    }

    fn filled(mapping: &TableMapping, overrides: &[(&str, SqlValue)]) -> Row {
        let mut row = Row::new();
        for col in mapping.source_columns() {
            row.set(col, 1);
        }
        for (col, value) in overrides {
            row.set(*col, value.clone());
        }
        row
    }

    fn mapping(source: &str) -> &'static TableMapping {
        CHARACTER_TABLES
            .iter()
            .find(|m| m.source_table == source)
            .unwrap()
    }

    fn record() -> CharacterRecord {
        let inventory = mapping("character_inventory");
        let spells = mapping("character_spells");
        let bind = mapping("character_bind");

        CharacterRecord {
            character: SourceCharacter {
                id: 7,
                account_id: 3,
                name: "Fippy".into(),
            },
            data: filled(&CHARACTER_DATA, &[("name", "Fippy".into())]),
            account: filled(&ACCOUNT, &[("name", "fippyacct".into())]),
            account_ips: vec![filled(&ACCOUNT_IP, &[("ip", SqlValue::I64(1))])],
            tables: vec![
                TableRows {
                    mapping: inventory,
                    rows: vec![
                        filled(inventory, &[("slotid", SqlValue::I64(22))]),
                        filled(inventory, &[("slotid", SqlValue::I64(0))]),
                    ],
                },
                TableRows {
                    mapping: spells,
                    rows: vec![filled(spells, &[]), filled(spells, &[])],
                },
                TableRows {
                    mapping: bind,
                    rows: vec![
                        filled(bind, &[("is_home", SqlValue::I64(0))]),
                        filled(bind, &[("is_home", SqlValue::I64(9))]),
                    ],
                },
            ],
        }
    }

    #[test]
    fn test_build_counts_and_skips() {
        let plan = TransferPlan::build(&record(), None).unwrap();
        assert_eq!(plan.character_name, "Fippy");
        assert_eq!(plan.account_name, "fippyacct");
        assert_eq!(plan.dependent_rows(), 5);
        assert_eq!(plan.skipped_rows(), 1);
        assert_eq!(plan.table_counts()["inventory"], 2);
        assert!(plan.creates_account());
    }

    #[test]
    fn test_build_orders_inventory_by_destination_slot() {
        let plan = TransferPlan::build(&record(), Some(4)).unwrap();
        let slots: Vec<i64> = plan.tables[0]
            .rows
            .iter()
            .map(|r| r.get("slot_id").and_then(SqlValue::as_i64).unwrap())
            .collect();
        assert_eq!(slots, [23, 33]);
        assert!(!plan.creates_account());
    }

    #[test]
    fn test_build_rejects_colliding_slots() {
        let mut rec = record();
        let inventory = mapping("character_inventory");
        // Unknown slot 30 passes through and lands on PEQ general slot 8.
        rec.tables[0].rows = vec![
            filled(inventory, &[("slotid", SqlValue::I64(29))]),
            filled(inventory, &[("slotid", SqlValue::I64(30))]),
        ];
        assert!(matches!(
            TransferPlan::build(&rec, None),
            Err(TransferError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_build_requires_account_name() {
        let mut rec = record();
        rec.account.set("name", SqlValue::Null);
        assert!(TransferPlan::build(&rec, None).is_err());
    }

    #[tokio::test]
    async fn test_apply_remaps_owner_columns() {
        let plan = TransferPlan::build(&record(), None).unwrap();
        let mut sink = RecordingSink::default();

        let outcome = apply_plan(&mut sink, &plan).await.unwrap();
        assert!(outcome.account_created);
        assert_eq!(outcome.account_id, 501);
        assert_eq!(outcome.character_id, 903);
        assert_eq!(outcome.rows_written, 5);

        let (table, ip) = &sink.inserted[1];
        assert_eq!(table, "account_ip");
        assert_eq!(ip.get("accid"), Some(&SqlValue::I64(501)));

        let (table, character) = &sink.inserted[2];
        assert_eq!(table, "character_data");
        assert_eq!(character.get("account_id"), Some(&SqlValue::I64(501)));
        assert!(!character.contains("id"));

        for (table, row) in &sink.inserted[3..] {
            let key = match table.as_str() {
                "inventory" => "character_id",
                _ => "id",
            };
            assert_eq!(row.get(key), Some(&SqlValue::I64(903)), "{}", table);
        }
    }

    #[tokio::test]
    async fn test_apply_reuses_existing_account() {
        let plan = TransferPlan::build(&record(), Some(42)).unwrap();
        let mut sink = RecordingSink::default();

        let outcome = apply_plan(&mut sink, &plan).await.unwrap();
        assert!(!outcome.account_created);
        assert_eq!(outcome.account_id, 42);
        assert!(sink.inserted.iter().all(|(t, _)| t != "account" && t != "account_ip"));
    }

    #[tokio::test]
    async fn test_apply_failure_names_table() {
        let plan = TransferPlan::build(&record(), Some(42)).unwrap();
        let mut sink = RecordingSink {
            fail_on: Some("character_spells"),
            ..Default::default()
        };

        match apply_plan(&mut sink, &plan).await {
            Err(TransferError::Transaction { table, .. }) => {
                assert_eq!(table, "character_spells")
            }
            other => panic!("expected transaction error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_apply_requires_character_id() {
        struct NoIds;

        #[async_trait]
        impl RowSink for NoIds {
            async fn insert(&mut self, _table: &str, _row: &Row) -> Result<u64> {
                Ok(0)
            }
        }

        let plan = TransferPlan::build(&record(), Some(42)).unwrap();
        let err = apply_plan(&mut NoIds, &plan).await.unwrap_err();
        assert!(matches!(err, TransferError::Transaction { .. }));
    }
}
