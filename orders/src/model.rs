use serde::{Deserialize, Serialize};

use gameapi::Skill;

pub type OrderId = String;

/// Where the ordered item comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Gather,
    Fight,
    Craft,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Claimed,
    Fulfilled,
}

/// A time-bounded exclusive claim by one character.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub char_name: String,
    pub lease_expires_at_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub item_code: String,
    pub source_type: SourceType,
    pub source_code: String,
    pub requester_name: String,
    #[serde(default)]
    pub recipe_code: Option<String>,
    #[serde(default)]
    pub gather_skill: Option<Skill>,
    pub source_level: u32,
    pub requested_qty: u32,
    pub remaining_qty: u32,
    pub status: OrderStatus,
    #[serde(default)]
    pub claim: Option<Claim>,
    pub created_at_ms: u64,
}

impl Order {
    /// A lease is live only while unexpired; expired leases count as open.
    pub fn lease_live(&self, now_ms: u64) -> bool {
        self.claim
            .as_ref()
            .is_some_and(|c| c.lease_expires_at_ms > now_ms)
    }

    pub fn claimable(&self, now_ms: u64) -> bool {
        match self.status {
            OrderStatus::Open => true,
            OrderStatus::Claimed => !self.lease_live(now_ms),
            OrderStatus::Fulfilled => false,
        }
    }

    pub fn claimed_by(&self, char_name: &str) -> bool {
        self.claim.as_ref().is_some_and(|c| c.char_name == char_name)
    }
}

/// Request for [`crate::OrderBoard::create_or_merge`].
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub requester_name: String,
    pub item_code: String,
    pub source_type: SourceType,
    pub source_code: String,
    pub recipe_code: Option<String>,
    pub gather_skill: Option<Skill>,
    pub source_level: u32,
    pub quantity: u32,
}

/// Why a character skips an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    InsufficientSkill,
    NoMapLocation,
    EventOnlyNotActive,
    MissingGatherSource,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::InsufficientSkill => "insufficient_skill",
            BlockReason::NoMapLocation => "no_map_location",
            BlockReason::EventOnlyNotActive => "event_only_not_active",
            BlockReason::MissingGatherSource => "missing_gather_source",
        }
    }

    /// Time-bounded reasons re-check after a while; the rest hold for the run.
    pub fn default_duration_ms(&self) -> Option<u64> {
        match self {
            BlockReason::MissingGatherSource => Some(10 * 60 * 1_000),
            _ => None,
        }
    }
}
