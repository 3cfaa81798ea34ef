//! Character transfer orchestrator - main workflow coordinator.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::core::{
    CharacterRecord, Row, SourceCharacter, SourceReader, TableRows, TargetWriter,
};
use crate::drivers::{MysqlReader, MysqlWriter};
use crate::error::{Result, TransferError};
use crate::mapping::{
    all_mappings, TableMapping, ACCOUNT, ACCOUNT_IP, CHARACTER_DATA, CHARACTER_TABLES,
};
use crate::plan::TransferPlan;

/// Source columns read outside of the row mappings.
const SOURCE_LOOKUP_COLUMNS: &[(&str, &str)] = &[("character_data", "account_id")];

/// Destination columns read by the name lookups.
const TARGET_LOOKUP_COLUMNS: &[(&str, &str)] = &[("account", "id"), ("character_data", "id")];

/// Transfer orchestrator.
pub struct Orchestrator {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
}

/// Result of a transfer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// Character name as found in the source.
    pub character_name: String,

    /// `character_data.id` in the source.
    pub source_character_id: i64,

    /// `character_data.id` assigned by the destination. `None` for dry runs.
    pub character_id: Option<i64>,

    /// Name of the owning account.
    pub account_name: String,

    /// Destination account id. `None` for a dry run that would create it.
    pub account_id: Option<i64>,

    /// Whether the account was (or, for a dry run, would be) created.
    pub account_created: bool,

    /// Rows per destination table.
    pub tables: BTreeMap<String, usize>,

    /// Total dependent rows copied.
    pub dependent_rows: usize,

    /// Source rows left out because they have no destination equivalent.
    pub skipped_rows: usize,

    /// Whether this was a dry run.
    pub dry_run: bool,

    /// When the transfer started.
    pub started_at: DateTime<Utc>,

    /// When the transfer completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl Orchestrator {
    /// Connect to both databases.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let source = MysqlReader::new(&config.source).await?;
        let target = match MysqlWriter::new(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::with_drivers(Arc::new(source), Arc::new(target)))
    }

    /// Build an orchestrator over already connected drivers.
    pub fn with_drivers(source: Arc<dyn SourceReader>, target: Arc<dyn TargetWriter>) -> Self {
        Self { source, target }
    }

    /// Transfer one character, then close both pools.
    pub async fn run(self, character_name: &str, dry_run: bool) -> Result<MigrationSummary> {
        let result = self.transfer(character_name, dry_run).await;
        self.close().await;
        result
    }

    /// Transfer one character.
    pub async fn migrate(&self, character_name: &str) -> Result<MigrationSummary> {
        self.transfer(character_name, false).await
    }

    /// Read and transform one character without writing anything.
    pub async fn dry_run(&self, character_name: &str) -> Result<MigrationSummary> {
        self.transfer(character_name, true).await
    }

    /// Release both connection pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }

    async fn transfer(&self, name: &str, dry_run: bool) -> Result<MigrationSummary> {
        let started_at = Utc::now();

        if name.trim().is_empty() {
            return Err(TransferError::Config("character name must not be empty".into()));
        }

        info!(
            "Transferring '{}' from {} to {}{}",
            name,
            self.source.database(),
            self.target.database(),
            if dry_run { " (dry run)" } else { "" }
        );

        // Phase 1: Verify both schemas
        self.verify_schema().await?;

        // Phase 2: Resolve the character on both sides
        let character = self.resolve_character(name).await?;
        if let Some(id) = self.target.find_character_id(&character.name).await? {
            return Err(TransferError::AlreadyExists {
                name: character.name,
                id,
            });
        }

        // Phase 3: Read and transform
        let record = self.load_record(&character).await?;
        let existing_account = match record.account_name() {
            Some(account) => self.target.find_account_id(account).await?,
            None => None,
        };
        let plan = TransferPlan::build(&record, existing_account)?;

        match existing_account {
            Some(id) => info!("Using existing account '{}' (id {})", plan.account_name, id),
            None => info!("Account '{}' will be created", plan.account_name),
        }
        for (table, rows) in plan.table_counts() {
            debug!("{}: {} row(s) planned", table, rows);
        }

        // Phase 4: Write
        let (character_id, account_id, account_created) = if dry_run {
            info!("Dry run: nothing written to {}", self.target.database());
            (None, existing_account, plan.creates_account())
        } else {
            let outcome = self.target.write_plan(&plan).await?;
            (
                Some(outcome.character_id),
                Some(outcome.account_id),
                outcome.account_created,
            )
        };

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let summary = MigrationSummary {
            character_name: plan.character_name.clone(),
            source_character_id: plan.source_character_id,
            character_id,
            account_name: plan.account_name.clone(),
            account_id,
            account_created,
            tables: plan.table_counts(),
            dependent_rows: plan.dependent_rows(),
            skipped_rows: plan.skipped_rows(),
            dry_run,
            started_at,
            completed_at,
            duration_seconds: duration,
        };

        info!(
            "Transfer {}: '{}' with {} dependent rows in {:.1}s",
            if dry_run { "planned" } else { "completed" },
            summary.character_name,
            summary.dependent_rows,
            summary.duration_seconds
        );

        Ok(summary)
    }

    /// Check that every mapped table exposes the columns the transfer uses.
    pub async fn verify_schema(&self) -> Result<()> {
        for mapping in all_mappings() {
            let table = mapping.source_table;
            let available = self.source.table_columns(table).await?;
            let wanted = required(mapping.source_columns(), table, SOURCE_LOOKUP_COLUMNS);
            let missing = missing_columns(&available, &wanted);
            if !missing.is_empty() {
                return Err(TransferError::SchemaMismatch {
                    database: self.source.database().to_string(),
                    table: table.to_string(),
                    missing,
                });
            }

            let table = mapping.target_table;
            let available = self.target.table_columns(table).await?;
            let wanted = required(mapping.target_columns(), table, TARGET_LOOKUP_COLUMNS);
            let missing = missing_columns(&available, &wanted);
            if !missing.is_empty() {
                return Err(TransferError::SchemaMismatch {
                    database: self.target.database().to_string(),
                    table: table.to_string(),
                    missing,
                });
            }
        }
        debug!("Schemas verified");
        Ok(())
    }

    async fn resolve_character(&self, name: &str) -> Result<SourceCharacter> {
        let mut found = self.source.find_characters(name).await?;
        match found.len() {
            0 => Err(TransferError::NotFound(name.to_string())),
            1 => Ok(found.remove(0)),
            count => Err(TransferError::Ambiguous {
                name: name.to_string(),
                count,
            }),
        }
    }

    /// Read a character's rows, its account and the account's IP history.
    pub async fn load_record(&self, character: &SourceCharacter) -> Result<CharacterRecord> {
        let data = self
            .read_single(&CHARACTER_DATA, character.id)
            .await?
            .ok_or_else(|| TransferError::NotFound(character.name.clone()))?;

        let account = self
            .read_single(&ACCOUNT, character.account_id)
            .await?
            .ok_or_else(|| {
                TransferError::InvalidRecord(format!(
                    "account {} of character '{}' does not exist",
                    character.account_id, character.name
                ))
            })?;

        let account_ips = self.read_mapped(&ACCOUNT_IP, character.account_id).await?;

        let mut tables = Vec::with_capacity(CHARACTER_TABLES.len());
        for mapping in CHARACTER_TABLES {
            let rows = self.read_mapped(mapping, character.id).await?;
            debug!("{}: {} row(s)", mapping.source_table, rows.len());
            tables.push(TableRows { mapping, rows });
        }

        let record = CharacterRecord {
            character: character.clone(),
            data,
            account,
            account_ips,
            tables,
        };
        info!(
            "Read '{}' (source id {}) with {} dependent rows",
            record.character.name,
            record.character.id,
            record.dependent_rows()
        );
        Ok(record)
    }

    /// Read the mapped columns of one owner's rows. Columns the mapping
    /// never uses are not selected, so their values cannot fail a transfer.
    async fn read_mapped(&self, mapping: &TableMapping, key: i64) -> Result<Vec<Row>> {
        self.source
            .read_rows(
                mapping.source_table,
                &mapping.source_columns(),
                mapping.source_key,
                key,
            )
            .await
    }

    async fn read_single(&self, mapping: &TableMapping, key: i64) -> Result<Option<Row>> {
        let mut rows = self.read_mapped(mapping, key).await?;
        if rows.len() > 1 {
            return Err(TransferError::InvalidRecord(format!(
                "{} has {} rows with {} = {}",
                mapping.source_table,
                rows.len(),
                mapping.source_key,
                key
            )));
        }
        Ok(rows.pop())
    }
}

impl MigrationSummary {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn required(
    mut columns: Vec<&'static str>,
    table: &str,
    lookups: &[(&str, &'static str)],
) -> Vec<&'static str> {
    for (t, col) in lookups {
        if *t == table && !columns.iter().any(|c| c.eq_ignore_ascii_case(col)) {
            columns.push(*col);
        }
    }
    columns
}

fn missing_columns(available: &[String], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|col| !available.iter().any(|a| a.eq_ignore_ascii_case(col)))
        .map(|col| col.to_string())
        .collect()
}
