//! Wire-format rows rendered by the dashboard.

use serde::Serialize;

use gameapi::CharacterData;
use ledger::BankSummary;
use orders::{Order, OrderStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    Starting,
    Running,
    Stopping,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub code: String,
    pub kind: String,
    pub progress: u32,
    pub total: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterView {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub level: u32,
    pub gold: u64,
    pub status: CharacterStatus,
    pub stale: bool,
    pub cooldown_until_ms: u64,
    pub last_action: String,
    pub inventory_used: u32,
    pub inventory_capacity: u32,
    pub task: Option<TaskView>,
}

impl CharacterView {
    pub fn from_live(
        live: &CharacterData,
        status: CharacterStatus,
        stale: bool,
        cooldown_until_ms: u64,
        last_action: &str,
    ) -> Self {
        Self {
            name: live.name.clone(),
            x: live.x,
            y: live.y,
            hp: live.hp,
            max_hp: live.max_hp,
            level: live.skills.combat,
            gold: live.gold,
            status,
            stale,
            cooldown_until_ms,
            last_action: last_action.to_string(),
            inventory_used: live.inventory_count(),
            inventory_capacity: live.inventory_capacity(),
            task: live.task.as_ref().map(|t| TaskView {
                code: t.code.clone(),
                kind: t.kind.clone(),
                progress: t.progress,
                total: t.total,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub id: String,
    pub item_code: String,
    pub source_type: String,
    pub source_code: String,
    pub requester: String,
    pub requested_qty: u32,
    pub remaining_qty: u32,
    pub status: String,
    pub claimed_by: Option<String>,
}

impl From<&Order> for OrderRow {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id.clone(),
            item_code: o.item_code.clone(),
            source_type: match o.source_type {
                orders::SourceType::Gather => "gather".into(),
                orders::SourceType::Fight => "fight".into(),
                orders::SourceType::Craft => "craft".into(),
            },
            source_code: o.source_code.clone(),
            requester: o.requester_name.clone(),
            requested_qty: o.requested_qty,
            remaining_qty: o.remaining_qty,
            status: match o.status {
                OrderStatus::Open => "open".into(),
                OrderStatus::Claimed => "claimed".into(),
                OrderStatus::Fulfilled => "fulfilled".into(),
            },
            claimed_by: o.claim.as_ref().map(|c| c.char_name.clone()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankView {
    pub gold: u64,
    pub slots: u32,
    pub used_slots: u32,
    pub next_expansion_cost: u64,
    pub distinct_codes: usize,
    pub total_quantity: u64,
    pub reserved_lines: usize,
}

impl From<&BankSummary> for BankView {
    fn from(s: &BankSummary) -> Self {
        Self {
            gold: s.gold,
            slots: s.slots,
            used_slots: s.used_slots,
            next_expansion_cost: s.next_expansion_cost,
            distinct_codes: s.distinct_codes,
            total_quantity: s.total_quantity,
            reserved_lines: s.reserved_lines,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generated_at_ms: u64,
    /// Human-readable copy of `generated_at_ms`, for the rolling log.
    pub generated_at: String,
    pub characters: Vec<CharacterView>,
    pub orders: Vec<OrderRow>,
    pub bank: BankView,
}

impl Default for CharacterStatus {
    fn default() -> Self {
        CharacterStatus::Unknown
    }
}
