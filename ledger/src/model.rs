use gameapi::SimpleItem;

pub type ReservationId = u64;

/// A non-durable intent to withdraw `quantity` of `code` from the bank.
/// Decrements perceived availability until released; never expires within a
/// run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub code: String,
    pub quantity: u32,
    pub owner: String,
    pub created_at_ms: u64,
}

/// Result of an all-or-nothing multi-line reservation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved(Vec<ReservationId>),
    /// The first line that could not be covered; nothing was persisted.
    Insufficient {
        code: String,
        wanted: u32,
        available: u32,
    },
}

impl ReserveOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved(_))
    }
}

/// Bank-wide figures for the status surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BankSummary {
    pub gold: u64,
    pub slots: u32,
    pub used_slots: u32,
    pub next_expansion_cost: u64,
    pub distinct_codes: usize,
    pub total_quantity: u64,
    pub reserved_lines: usize,
}

/// Merge duplicate codes and drop non-positive lines, preserving first-seen
/// order. Shared by the bank operation planners.
pub fn normalize_lines(lines: &[SimpleItem]) -> Vec<SimpleItem> {
    let mut out: Vec<SimpleItem> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.code.is_empty() || line.quantity == 0 {
            continue;
        }
        match out.iter_mut().find(|l| l.code == line.code) {
            Some(existing) => existing.quantity += line.quantity,
            None => out.push(line.clone()),
        }
    }
    out
}
