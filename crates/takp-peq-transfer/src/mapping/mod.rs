//! Declarative TAKP → PEQ table mappings.
//!
//! Every copied table is described by a [`TableMapping`]: where its rows come
//! from, which column links them to their owner on each side, and how each
//! destination column is produced. The same description drives the schema
//! check, the source query and the row transform.

pub mod slots;

use crate::core::{Row, SqlValue};
use crate::error::{Result, TransferError};

/// A constant destination value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Text(&'static str),
    Null,
}

impl Literal {
    fn to_value(self) -> SqlValue {
        match self {
            Literal::Int(v) => SqlValue::I64(v),
            Literal::Text(v) => SqlValue::Text(v.to_string()),
            Literal::Null => SqlValue::Null,
        }
    }
}

/// How one destination column is produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnRule {
    /// Copy a column that has the same name on both sides.
    Keep(&'static str),
    /// Copy a column under a new name.
    Rename {
        from: &'static str,
        to: &'static str,
    },
    /// Write a constant; PEQ-only columns get their defaults this way.
    Const { to: &'static str, value: Literal },
    /// Copy an inventory slot id through [`slots::translate_slot`].
    InventorySlot {
        from: &'static str,
        to: &'static str,
    },
}

impl ColumnRule {
    /// Source column read by this rule, if any.
    pub fn source_column(&self) -> Option<&'static str> {
        match *self {
            ColumnRule::Keep(name) => Some(name),
            ColumnRule::Rename { from, .. } | ColumnRule::InventorySlot { from, .. } => Some(from),
            ColumnRule::Const { .. } => None,
        }
    }

    /// Destination column written by this rule.
    pub fn target_column(&self) -> &'static str {
        match *self {
            ColumnRule::Keep(name) => name,
            ColumnRule::Rename { to, .. }
            | ColumnRule::Const { to, .. }
            | ColumnRule::InventorySlot { to, .. } => to,
        }
    }
}

/// Mapping of one TAKP table onto one PEQ table.
#[derive(Debug, Clone, Copy)]
pub struct TableMapping {
    /// Source table name.
    pub source_table: &'static str,
    /// Source column matched against the owner's id when loading rows.
    pub source_key: &'static str,
    /// Destination table name.
    pub target_table: &'static str,
    /// Destination column receiving the owner's new id. `None` when the row
    /// has no owner on the destination side.
    pub target_key: Option<&'static str>,
    /// Destination column rules, in insert order.
    pub columns: &'static [ColumnRule],
    /// Rows for which this returns false are not copied.
    pub filter: Option<fn(&Row) -> bool>,
}

impl TableMapping {
    /// Columns the source table must provide.
    pub fn source_columns(&self) -> Vec<&'static str> {
        let mut cols = vec![self.source_key];
        for name in self.columns.iter().filter_map(ColumnRule::source_column) {
            if !cols.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                cols.push(name);
            }
        }
        cols
    }

    /// Columns the destination table must provide.
    pub fn target_columns(&self) -> Vec<&'static str> {
        self.target_key
            .into_iter()
            .chain(self.columns.iter().map(ColumnRule::target_column))
            .collect()
    }

    /// Whether a source row should be copied.
    pub fn accepts(&self, row: &Row) -> bool {
        self.filter.map_or(true, |f| f(row))
    }

    /// Transform a source row into a destination row.
    ///
    /// The owner column ([`Self::target_key`]) is left out; it is filled in
    /// when the row is written and the owner's new id is known.
    pub fn transform(&self, row: &Row) -> Result<Row> {
        let mut out = Row::new();
        for rule in self.columns {
            let value = match *rule {
                ColumnRule::Keep(from) | ColumnRule::Rename { from, .. } => {
                    self.source_value(row, from)?.clone()
                }
                ColumnRule::Const { value, .. } => value.to_value(),
                ColumnRule::InventorySlot { from, .. } => {
                    let raw = self.source_value(row, from)?;
                    let slot = raw.as_i64().ok_or_else(|| {
                        TransferError::InvalidRecord(format!(
                            "{}.{} is not an integer slot: {}",
                            self.source_table, from, raw
                        ))
                    })?;
                    SqlValue::I64(slots::translate_slot(slot))
                }
            };
            out.set(rule.target_column(), value);
        }
        Ok(out)
    }

    fn source_value<'r>(&self, row: &'r Row, column: &str) -> Result<&'r SqlValue> {
        row.get(column).ok_or_else(|| {
            TransferError::InvalidRecord(format!(
                "{} row has no column {}",
                self.source_table, column
            ))
        })
    }
}

use ColumnRule::{Const, InventorySlot, Keep, Rename};
use Literal::{Int, Null, Text};

/// TAKP `account` → PEQ `account`. The id is assigned by the destination.
pub static ACCOUNT: TableMapping = TableMapping {
    source_table: "account",
    source_key: "id",
    target_table: "account",
    target_key: None,
    columns: &[
        Keep("name"),
        Keep("charname"),
        Const { to: "auto_login_charname", value: Text("") },
        Keep("sharedplat"),
        Keep("password"),
        Keep("status"),
        Const { to: "ls_id", value: Text("local") },
        Keep("lsaccount_id"),
        Keep("gmspeed"),
        Rename { from: "gminvul", to: "invulnerable" },
        Keep("flymode"),
        Keep("ignore_tells"),
        Keep("revoked"),
        Keep("karma"),
        Keep("minilogin_ip"),
        Keep("hideme"),
        Keep("rulesflag"),
        Keep("suspendeduntil"),
        Keep("time_creation"),
        Keep("ban_reason"),
        Keep("suspend_reason"),
    ],
    filter: None,
};

/// TAKP `account_ip` → PEQ `account_ip`, owned by the account.
pub static ACCOUNT_IP: TableMapping = TableMapping {
    source_table: "account_ip",
    source_key: "accid",
    target_table: "account_ip",
    target_key: Some("accid"),
    columns: &[Keep("ip"), Keep("count"), Keep("lastused")],
    filter: None,
};

/// TAKP `character_data` → PEQ `character_data`, owned by the account.
///
/// PEQ-only columns (drakkin, leadership, LDoN, tribute, extended PvP,
/// consent, legacy AA) get their defaults. TAKP's forum_id, boatid,
/// boatname, famished, is_deleted and fatigue have no PEQ counterpart.
pub static CHARACTER_DATA: TableMapping = TableMapping {
    source_table: "character_data",
    source_key: "id",
    target_table: "character_data",
    target_key: Some("account_id"),
    columns: &[
        Keep("name"),
        Keep("last_name"),
        Keep("title"),
        Keep("suffix"),
        Keep("zone_id"),
        Const { to: "zone_instance", value: Int(0) },
        Keep("y"),
        Keep("x"),
        Keep("z"),
        Keep("heading"),
        Keep("gender"),
        Keep("race"),
        Keep("class"),
        Keep("level"),
        Keep("deity"),
        Keep("birthday"),
        Keep("last_login"),
        Keep("time_played"),
        Keep("level2"),
        Keep("anon"),
        Keep("gm"),
        Keep("face"),
        Keep("hair_color"),
        Keep("hair_style"),
        Keep("beard"),
        Keep("beard_color"),
        Keep("eye_color_1"),
        Keep("eye_color_2"),
        Const { to: "drakkin_heritage", value: Int(0) },
        Const { to: "drakkin_tattoo", value: Int(0) },
        Const { to: "drakkin_details", value: Int(0) },
        Const { to: "ability_time_seconds", value: Int(0) },
        Const { to: "ability_number", value: Int(0) },
        Const { to: "ability_time_minutes", value: Int(0) },
        Const { to: "ability_time_hours", value: Int(0) },
        Keep("exp"),
        Const { to: "exp_enabled", value: Int(1) },
        Keep("aa_points_spent"),
        Keep("aa_exp"),
        Keep("aa_points"),
        Const { to: "group_leadership_exp", value: Int(0) },
        Const { to: "raid_leadership_exp", value: Int(0) },
        Const { to: "group_leadership_points", value: Int(0) },
        Const { to: "raid_leadership_points", value: Int(0) },
        Keep("points"),
        Keep("cur_hp"),
        Keep("mana"),
        Keep("endurance"),
        Keep("intoxication"),
        Keep("str"),
        Keep("sta"),
        Keep("cha"),
        Keep("dex"),
        Keep("int"),
        Keep("agi"),
        Keep("wis"),
        Const { to: "extra_haste", value: Int(0) },
        Keep("zone_change_count"),
        Const { to: "toxicity", value: Int(0) },
        Keep("hunger_level"),
        Keep("thirst_level"),
        Const { to: "ability_up", value: Int(0) },
        Const { to: "ldon_points_guk", value: Int(0) },
        Const { to: "ldon_points_mir", value: Int(0) },
        Const { to: "ldon_points_mmc", value: Int(0) },
        Const { to: "ldon_points_ruj", value: Int(0) },
        Const { to: "ldon_points_tak", value: Int(0) },
        Const { to: "ldon_points_available", value: Int(0) },
        Const { to: "tribute_time_remaining", value: Int(0) },
        Const { to: "career_tribute_points", value: Int(0) },
        Const { to: "tribute_points", value: Int(0) },
        Const { to: "tribute_active", value: Int(0) },
        Keep("pvp_status"),
        Const { to: "pvp_kills", value: Int(0) },
        Const { to: "pvp_deaths", value: Int(0) },
        Const { to: "pvp_current_points", value: Int(0) },
        Const { to: "pvp_career_points", value: Int(0) },
        Const { to: "pvp_best_kill_streak", value: Int(0) },
        Const { to: "pvp_worst_death_streak", value: Int(0) },
        Const { to: "pvp_current_kill_streak", value: Int(0) },
        Const { to: "pvp2", value: Int(0) },
        Const { to: "pvp_type", value: Int(0) },
        Rename { from: "showhelm", to: "show_helm" },
        Const { to: "group_auto_consent", value: Int(0) },
        Const { to: "raid_auto_consent", value: Int(0) },
        Const { to: "guild_auto_consent", value: Int(0) },
        Const { to: "leadership_exp_on", value: Int(0) },
        Const { to: "RestTimer", value: Int(0) },
        Keep("air_remaining"),
        Keep("autosplit_enabled"),
        Const { to: "lfp", value: Int(0) },
        Const { to: "lfg", value: Int(0) },
        Keep("mailkey"),
        Const { to: "xtargets", value: Int(5) },
        Rename { from: "firstlogon", to: "first_login" },
        Const { to: "ingame", value: Int(0) },
        Keep("e_aa_effects"),
        Keep("e_percent_to_aa"),
        Keep("e_expended_aa_spent"),
        Const { to: "aa_points_spent_old", value: Int(0) },
        Const { to: "aa_points_old", value: Int(0) },
        Const { to: "e_last_invsnapshot", value: Int(0) },
        Const { to: "deleted_at", value: Null },
        Const { to: "illusion_block", value: Int(0) },
    ],
    filter: None,
};

/// Name of the inventory destination table; its rows are slot-ordered.
pub const INVENTORY_TABLE: &str = "inventory";

/// Tables owned by the character, in write order.
pub static CHARACTER_TABLES: &[TableMapping] = &[
    TableMapping {
        source_table: "character_alternate_abilities",
        source_key: "id",
        target_table: "character_alternate_abilities",
        target_key: Some("id"),
        columns: &[
            Keep("aa_id"),
            Keep("aa_value"),
            Const { to: "charges", value: Int(0) },
        ],
        filter: None,
    },
    TableMapping {
        source_table: "character_bind",
        source_key: "id",
        target_table: "character_bind",
        target_key: Some("id"),
        columns: &[
            Rename { from: "is_home", to: "slot" },
            Keep("zone_id"),
            Const { to: "instance_id", value: Int(0) },
            Keep("x"),
            Keep("y"),
            Keep("z"),
            Keep("heading"),
        ],
        filter: Some(is_known_bind),
    },
    TableMapping {
        source_table: "character_currency",
        source_key: "id",
        target_table: "character_currency",
        target_key: Some("id"),
        columns: &[
            Keep("platinum"),
            Keep("gold"),
            Keep("silver"),
            Keep("copper"),
            Keep("platinum_bank"),
            Keep("gold_bank"),
            Keep("silver_bank"),
            Keep("copper_bank"),
            Keep("platinum_cursor"),
            Keep("gold_cursor"),
            Keep("silver_cursor"),
            Keep("copper_cursor"),
            Const { to: "radiant_crystals", value: Int(0) },
            Const { to: "career_radiant_crystals", value: Int(0) },
            Const { to: "ebon_crystals", value: Int(0) },
            Const { to: "career_ebon_crystals", value: Int(0) },
        ],
        filter: None,
    },
    TableMapping {
        source_table: "character_faction_values",
        source_key: "id",
        target_table: "faction_values",
        target_key: Some("char_id"),
        columns: &[Keep("faction_id"), Keep("current_value"), Keep("temp")],
        filter: None,
    },
    TableMapping {
        source_table: "character_inventory",
        source_key: "id",
        target_table: INVENTORY_TABLE,
        target_key: Some("character_id"),
        columns: &[
            InventorySlot { from: "slotid", to: "slot_id" },
            Rename { from: "itemid", to: "item_id" },
            Keep("charges"),
            Const { to: "color", value: Int(0) },
            Const { to: "augment_one", value: Int(0) },
            Const { to: "augment_two", value: Int(0) },
            Const { to: "augment_three", value: Int(0) },
            Const { to: "augment_four", value: Int(0) },
            Const { to: "augment_five", value: Int(0) },
            Const { to: "augment_six", value: Int(0) },
            Const { to: "instnodrop", value: Int(0) },
            Keep("custom_data"),
            Const { to: "ornament_icon", value: Int(0) },
            Const { to: "ornament_idfile", value: Int(0) },
            Const { to: "ornament_hero_model", value: Int(0) },
            Const { to: "guid", value: Int(0) },
        ],
        filter: None,
    },
    TableMapping {
        source_table: "character_languages",
        source_key: "id",
        target_table: "character_languages",
        target_key: Some("id"),
        columns: &[Keep("lang_id"), Keep("value")],
        filter: None,
    },
    TableMapping {
        source_table: "character_keyring",
        source_key: "id",
        target_table: "keyring",
        target_key: Some("char_id"),
        columns: &[Keep("item_id")],
        filter: None,
    },
    TableMapping {
        source_table: "character_spells",
        source_key: "id",
        target_table: "character_spells",
        target_key: Some("id"),
        columns: &[Keep("slot_id"), Keep("spell_id")],
        filter: None,
    },
    TableMapping {
        source_table: "character_memmed_spells",
        source_key: "id",
        target_table: "character_memmed_spells",
        target_key: Some("id"),
        columns: &[Keep("slot_id"), Keep("spell_id")],
        filter: None,
    },
    TableMapping {
        source_table: "character_skills",
        source_key: "id",
        target_table: "character_skills",
        target_key: Some("id"),
        columns: &[Keep("skill_id"), Keep("value")],
        filter: None,
    },
];

/// Every mapping, for schema verification.
pub fn all_mappings() -> impl Iterator<Item = &'static TableMapping> {
    [&ACCOUNT, &ACCOUNT_IP, &CHARACTER_DATA]
        .into_iter()
        .chain(CHARACTER_TABLES.iter())
}

/// TAKP `is_home` 0 is the bind affinity point and 1 the home city; both map
/// straight onto PEQ bind slots. Anything else has no PEQ equivalent.
fn is_known_bind(row: &Row) -> bool {
    matches!(row.get("is_home").and_then(SqlValue::as_i64), Some(0 | 1))
}
