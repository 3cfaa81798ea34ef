//! Inventory slot translation between the TAKP and PEQ layouts.
//!
//! TAKP keeps the classic client layout: cursor at slot 0, eight general
//! slots and ten-slot bags. PEQ adds charm, power source and two more general
//! slots, moves the cursor to 33 and gives every bag 200 sub-slots.

use tracing::warn;

/// TAKP slot constants.
pub mod takp {
    pub const CURSOR: i64 = 0;
    pub const EQUIPMENT_BEGIN: i64 = 1;
    pub const EQUIPMENT_END: i64 = 20;
    pub const AMMO: i64 = 21;
    pub const GENERAL_BEGIN: i64 = 22;
    pub const GENERAL_END: i64 = 29;
    pub const GENERAL_BAGS_BEGIN: i64 = 250;
    pub const GENERAL_BAGS_END: i64 = 329;
    pub const CURSOR_BAG_BEGIN: i64 = 330;
    pub const CURSOR_BAG_END: i64 = 339;
    pub const BANK_BEGIN: i64 = 2000;
    pub const BANK_END: i64 = 2007;
    pub const BANK_BAGS_BEGIN: i64 = 2030;
    pub const BANK_BAGS_END: i64 = 2109;
    pub const BAG_SIZE: i64 = 10;
}

/// PEQ slot constants.
pub mod peq {
    pub const AMMO: i64 = 22;
    pub const GENERAL_BEGIN: i64 = 23;
    pub const CURSOR: i64 = 33;
    pub const GENERAL_BAGS_BEGIN: i64 = 4010;
    pub const CURSOR_BAG_BEGIN: i64 = 6010;
    pub const BANK_BAGS_BEGIN: i64 = 6210;
    pub const BAG_SIZE: i64 = 200;
}

/// Translate a TAKP inventory slot id to the PEQ slot id.
///
/// Slots outside every known range are returned unchanged.
pub fn translate_slot(slot: i64) -> i64 {
    match slot {
        takp::CURSOR => peq::CURSOR,
        takp::EQUIPMENT_BEGIN..=takp::EQUIPMENT_END => slot,
        takp::AMMO => peq::AMMO,
        takp::GENERAL_BEGIN..=takp::GENERAL_END => {
            peq::GENERAL_BEGIN + (slot - takp::GENERAL_BEGIN)
        }
        takp::GENERAL_BAGS_BEGIN..=takp::GENERAL_BAGS_END => {
            bag_slot(slot, takp::GENERAL_BAGS_BEGIN, peq::GENERAL_BAGS_BEGIN)
        }
        takp::CURSOR_BAG_BEGIN..=takp::CURSOR_BAG_END => {
            peq::CURSOR_BAG_BEGIN + (slot - takp::CURSOR_BAG_BEGIN)
        }
        takp::BANK_BEGIN..=takp::BANK_END => slot,
        takp::BANK_BAGS_BEGIN..=takp::BANK_BAGS_END => {
            bag_slot(slot, takp::BANK_BAGS_BEGIN, peq::BANK_BAGS_BEGIN)
        }
        _ => {
            warn!("Unknown TAKP inventory slot {}, keeping it unchanged", slot);
            slot
        }
    }
}

fn bag_slot(slot: i64, takp_begin: i64, peq_begin: i64) -> i64 {
    let offset = slot - takp_begin;
    let bag = offset / takp::BAG_SIZE;
    let sub_slot = offset % takp::BAG_SIZE;
    peq_begin + bag * peq::BAG_SIZE + sub_slot
}
