//! The source-side record graph of one character.

use crate::mapping::TableMapping;

use super::row::Row;

/// A `character_data` row matched by name in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCharacter {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
}

/// Rows read from one mapped source table.
#[derive(Debug, Clone)]
pub struct TableRows {
    pub mapping: &'static TableMapping,
    pub rows: Vec<Row>,
}

/// Everything read from the source for one character.
///
/// The character row is the root; every entry of `tables` holds rows whose
/// owner column equals the character's source id.
#[derive(Debug, Clone)]
pub struct CharacterRecord {
    /// The matched character.
    pub character: SourceCharacter,
    /// Full `character_data` row.
    pub data: Row,
    /// The owning `account` row.
    pub account: Row,
    /// The account's `account_ip` rows.
    pub account_ips: Vec<Row>,
    /// Dependent rows per mapped table, in write order.
    pub tables: Vec<TableRows>,
}

impl CharacterRecord {
    /// Account name used to find the matching destination account.
    pub fn account_name(&self) -> Option<&str> {
        self.account.get("name").and_then(|v| v.as_str())
    }

    /// Number of dependent rows across all tables.
    pub fn dependent_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}
