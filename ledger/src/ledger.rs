//! The inventory ledger itself.
//!
//! Locking discipline: all bookkeeping lives behind a sync mutex that is
//! never held across an await point. Refreshes coordinate through a separate
//! async gate so concurrent callers collapse onto one inflight fetch while
//! readers keep serving the previous cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use common::Clock;
use gameapi::{ApiError, BankDetails, GameApi, Page, SimpleItem};

use crate::model::{BankSummary, Reservation, ReservationId, ReserveOutcome};

const DEFAULT_TTL_MS: u64 = 120_000;

/// The slice of the game API the ledger needs.
#[async_trait::async_trait]
pub trait BankSource: Send + Sync {
    async fn fetch_bank_items(&self, page: u32) -> Result<Page<SimpleItem>, ApiError>;
    async fn fetch_bank_details(&self) -> Result<BankDetails, ApiError>;
}

#[async_trait::async_trait]
impl<T: GameApi + ?Sized> BankSource for T {
    async fn fetch_bank_items(&self, page: u32) -> Result<Page<SimpleItem>, ApiError> {
        self.get_bank_items(page).await
    }

    async fn fetch_bank_details(&self) -> Result<BankDetails, ApiError> {
        self.get_bank_details().await
    }
}

#[derive(Default)]
struct LedgerState {
    items: BTreeMap<String, u32>,
    details: BankDetails,
    /// 0 means never fetched.
    fetched_at_ms: u64,
    reservations: HashMap<ReservationId, Reservation>,
    /// Per-character carried quantities, pushed by workers after refresh.
    carried: HashMap<String, HashMap<String, u32>>,
}

impl LedgerState {
    fn reserved_total(&self, code: &str) -> u32 {
        self.reservations
            .values()
            .filter(|r| r.code == code)
            .map(|r| r.quantity)
            .sum()
    }

    fn available(&self, code: &str) -> u32 {
        let bank = self.items.get(code).copied().unwrap_or(0);
        bank.saturating_sub(self.reserved_total(code))
    }
}

pub struct InventoryLedger {
    source: Arc<dyn BankSource>,
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
    state: Mutex<LedgerState>,
    refresh_gate: tokio::sync::Mutex<()>,
    next_reservation_id: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaDirection {
    Withdraw,
    Deposit,
}

impl InventoryLedger {
    pub fn new(source: Arc<dyn BankSource>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(source, clock, DEFAULT_TTL_MS)
    }

    pub fn with_ttl(source: Arc<dyn BankSource>, clock: Arc<dyn Clock>, ttl_ms: u64) -> Self {
        Self {
            source,
            clock,
            ttl_ms,
            state: Mutex::new(LedgerState::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
            next_reservation_id: AtomicU64::new(1),
        }
    }

    /// Bank contents, ordered by code. Refreshes when forced or when the
    /// cache TTL has expired; concurrent refreshers share one fetch.
    pub async fn get_bank_items(&self, force_refresh: bool) -> Vec<SimpleItem> {
        self.ensure_fresh(force_refresh).await;
        let state = self.state.lock();
        state
            .items
            .iter()
            .map(|(code, qty)| SimpleItem::new(code.clone(), *qty))
            .collect()
    }

    async fn ensure_fresh(&self, force: bool) {
        let (stale, seen) = {
            let state = self.state.lock();
            let now = self.clock.now_ms();
            let expired =
                state.fetched_at_ms == 0 || now.saturating_sub(state.fetched_at_ms) >= self.ttl_ms;
            (force || expired, state.fetched_at_ms)
        };
        if !stale {
            return;
        }

        let _gate = self.refresh_gate.lock().await;

        // A refresh that completed while we waited for the gate covers us.
        {
            let state = self.state.lock();
            if state.fetched_at_ms > seen {
                return;
            }
        }

        match self.fetch_all().await {
            Ok((items, details)) => {
                let mut state = self.state.lock();
                state.items = items;
                state.details = details;
                state.fetched_at_ms = self.clock.now_ms();
                debug!(
                    codes = state.items.len(),
                    gold = state.details.gold,
                    "bank cache refreshed"
                );
            }
            Err(e) => {
                warn!(error = %e, "bank refresh failed, serving previous cache");
            }
        }
    }

    async fn fetch_all(&self) -> Result<(BTreeMap<String, u32>, BankDetails), ApiError> {
        let mut items = BTreeMap::new();
        let mut page = 1;
        loop {
            let batch = self.source.fetch_bank_items(page).await?;
            for item in &batch.items {
                *items.entry(item.code.clone()).or_insert(0) += item.quantity;
            }
            if !batch.has_more() {
                break;
            }
            page += 1;
        }
        let details = self.source.fetch_bank_details().await?;
        Ok((items, details))
    }

    pub fn bank_count(&self, code: &str) -> u32 {
        self.state.lock().items.get(code).copied().unwrap_or(0)
    }

    /// Bank quantity minus reservations, optionally counting one character's
    /// own carried copies as available.
    pub fn available_bank_count(&self, code: &str, include_char: Option<&str>) -> u32 {
        let state = self.state.lock();
        let carried = include_char
            .and_then(|name| state.carried.get(name))
            .and_then(|counts| counts.get(code))
            .copied()
            .unwrap_or(0);
        state.available(code) + carried
    }

    /// Bank plus every character's carried quantity.
    pub fn global_count(&self, code: &str) -> u32 {
        let state = self.state.lock();
        let carried: u32 = state
            .carried
            .values()
            .filter_map(|counts| counts.get(code))
            .sum();
        state.items.get(code).copied().unwrap_or(0) + carried
    }

    /// Record what a character currently carries. Replaces previous figures.
    pub fn set_carried(&self, name: &str, counts: HashMap<String, u32>) {
        self.state.lock().carried.insert(name.to_string(), counts);
    }

    #[instrument(skip(self), fields(code = %code, qty = quantity, owner = %owner))]
    pub fn reserve(&self, code: &str, quantity: u32, owner: &str) -> Option<ReservationId> {
        if quantity == 0 {
            return None;
        }
        let mut state = self.state.lock();
        if state.available(code) < quantity {
            debug!(available = state.available(code), "reservation refused");
            return None;
        }
        let id = self.next_reservation_id.fetch_add(1, Ordering::Relaxed);
        state.reservations.insert(
            id,
            Reservation {
                id,
                code: code.to_string(),
                quantity,
                owner: owner.to_string(),
                created_at_ms: self.clock.now_ms(),
            },
        );
        Some(id)
    }

    /// All-or-nothing reservation of several lines. Either every line is
    /// recorded or none is.
    pub fn reserve_many(&self, requests: &[SimpleItem], owner: &str) -> ReserveOutcome {
        let mut state = self.state.lock();

        // Duplicate codes in the request must be summed before checking.
        let mut wanted: BTreeMap<&str, u32> = BTreeMap::new();
        for req in requests {
            if req.quantity > 0 {
                *wanted.entry(req.code.as_str()).or_insert(0) += req.quantity;
            }
        }

        for (code, qty) in &wanted {
            let available = state.available(code);
            if available < *qty {
                return ReserveOutcome::Insufficient {
                    code: (*code).to_string(),
                    wanted: *qty,
                    available,
                };
            }
        }

        let now = self.clock.now_ms();
        let mut ids = Vec::with_capacity(requests.len());
        for req in requests {
            if req.quantity == 0 {
                continue;
            }
            let id = self.next_reservation_id.fetch_add(1, Ordering::Relaxed);
            state.reservations.insert(
                id,
                Reservation {
                    id,
                    code: req.code.clone(),
                    quantity: req.quantity,
                    owner: owner.to_string(),
                    created_at_ms: now,
                },
            );
            ids.push(id);
        }
        ReserveOutcome::Reserved(ids)
    }

    /// Idempotent.
    pub fn release(&self, id: ReservationId) {
        self.state.lock().reservations.remove(&id);
    }

    pub fn reserved_total(&self, code: &str) -> u32 {
        self.state.lock().reserved_total(code)
    }

    /// Mutate the cache after a confirmed bank transaction. Withdraws also
    /// consume the owner's reservations on the moved codes.
    pub fn apply_bank_delta(&self, owner: &str, direction: DeltaDirection, items: &[SimpleItem]) {
        let mut state = self.state.lock();
        for item in items {
            match direction {
                DeltaDirection::Deposit => {
                    *state.items.entry(item.code.clone()).or_insert(0) += item.quantity;
                }
                DeltaDirection::Withdraw => {
                    let emptied = match state.items.get_mut(&item.code) {
                        Some(qty) => {
                            *qty = qty.saturating_sub(item.quantity);
                            *qty == 0
                        }
                        None => false,
                    };
                    if emptied {
                        state.items.remove(&item.code);
                    }

                    // Consume this owner's reservations for the code.
                    let mut remaining = item.quantity;
                    let ids: Vec<ReservationId> = state
                        .reservations
                        .values()
                        .filter(|r| r.owner == owner && r.code == item.code)
                        .map(|r| r.id)
                        .collect();
                    for id in ids {
                        if remaining == 0 {
                            break;
                        }
                        if let Some(r) = state.reservations.get_mut(&id) {
                            let consumed = r.quantity.min(remaining);
                            r.quantity -= consumed;
                            remaining -= consumed;
                            if r.quantity == 0 {
                                state.reservations.remove(&id);
                            }
                        }
                    }
                }
            }
        }
        state.details.used_slots = state.items.len() as u32;
    }

    pub fn apply_gold_delta(&self, direction: DeltaDirection, quantity: u64) {
        let mut state = self.state.lock();
        state.details.gold = match direction {
            DeltaDirection::Deposit => state.details.gold.saturating_add(quantity),
            DeltaDirection::Withdraw => state.details.gold.saturating_sub(quantity),
        };
    }

    /// Drop the cache TTL so the next read refreshes.
    pub fn invalidate(&self, reason: &str) {
        self.state.lock().fetched_at_ms = 0;
        info!(reason, "bank cache invalidated");
    }

    pub fn details(&self) -> BankDetails {
        self.state.lock().details.clone()
    }

    pub fn summary(&self) -> BankSummary {
        let state = self.state.lock();
        BankSummary {
            gold: state.details.gold,
            slots: state.details.slots,
            used_slots: state.details.used_slots,
            next_expansion_cost: state.details.next_expansion_cost,
            distinct_codes: state.items.len(),
            total_quantity: state.items.values().map(|q| *q as u64).sum(),
            reserved_lines: state.reservations.len(),
        }
    }
}
