//! In-memory mirror of the order file plus the per-character block registry.
//!
//! Every mutation flushes the full order list back through the store before
//! returning, so the on-disk file is the source of truth at all times.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use common::Clock;
use gameapi::SimpleItem;

use crate::model::{BlockReason, Claim, NewOrder, Order, OrderId, OrderStatus};
use crate::store::{OrderBoardError, OrderStore};

/// One credit applied to an order by a bank deposit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub order_id: OrderId,
    pub item_code: String,
    pub quantity: u32,
    pub status: OrderStatus,
    /// True when the deposit came from a character that had not claimed
    /// the order.
    pub opportunistic: bool,
}

struct Block {
    reason: BlockReason,
    /// None holds for the rest of the run.
    until_ms: Option<u64>,
}

struct BoardState {
    orders: Vec<Order>,
    blocks: HashMap<(String, OrderId), Block>,
}

pub struct OrderBoard {
    store: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<BoardState>,
}

impl OrderBoard {
    /// Load the board from its store and compact stale claims: any lease
    /// that expired while the process was down reverts to open.
    pub async fn initialize(
        store: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, OrderBoardError> {
        let mut orders = store.load().await?;
        let now = clock.now_ms();

        let mut compacted = 0;
        for order in &mut orders {
            if order.status == OrderStatus::Claimed && !order.lease_live(now) {
                order.status = OrderStatus::Open;
                order.claim = None;
                compacted += 1;
            }
        }
        if compacted > 0 {
            info!(compacted, "released stale order claims on startup");
            store.persist(&orders).await?;
        }

        Ok(Self {
            store,
            clock,
            state: Mutex::new(BoardState {
                orders,
                blocks: HashMap::new(),
            }),
        })
    }

    /// Post an order, merging into an existing open/claimed order for the
    /// same `(item, source type, source code)`. Merging never re-ids.
    #[instrument(skip(self, req), fields(item = %req.item_code, qty = req.quantity))]
    pub async fn create_or_merge(&self, req: NewOrder) -> Result<Order, OrderBoardError> {
        let mut state = self.state.lock().await;

        let merged = state.orders.iter_mut().find(|o| {
            o.status != OrderStatus::Fulfilled
                && o.item_code == req.item_code
                && o.source_type == req.source_type
                && o.source_code == req.source_code
        });

        let order = match merged {
            Some(existing) => {
                existing.requested_qty += req.quantity;
                existing.remaining_qty += req.quantity;
                debug!(order_id = %existing.id, "merged into existing order");
                existing.clone()
            }
            None => {
                let order = Order {
                    id: format!("ord-{}", Uuid::new_v4().simple()),
                    item_code: req.item_code,
                    source_type: req.source_type,
                    source_code: req.source_code,
                    requester_name: req.requester_name,
                    recipe_code: req.recipe_code,
                    gather_skill: req.gather_skill,
                    source_level: req.source_level,
                    requested_qty: req.quantity,
                    remaining_qty: req.quantity,
                    status: OrderStatus::Open,
                    claim: None,
                    created_at_ms: self.clock.now_ms(),
                };
                state.orders.push(order.clone());
                order
            }
        };

        self.store.persist(&state.orders).await?;
        Ok(order)
    }

    /// Atomically claim an order. Succeeds only when the order is open or
    /// carries an expired lease.
    #[instrument(skip(self), fields(order_id = %id, char = %char_name))]
    pub async fn claim(
        &self,
        id: &str,
        char_name: &str,
        lease_ms: u64,
    ) -> Result<Option<Order>, OrderBoardError> {
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;

        let Some(order) = state.orders.iter_mut().find(|o| o.id == id) else {
            return Ok(None);
        };
        if !order.claimable(now) {
            debug!("order not claimable");
            return Ok(None);
        }

        order.status = OrderStatus::Claimed;
        order.claim = Some(Claim {
            char_name: char_name.to_string(),
            lease_expires_at_ms: now + lease_ms,
        });
        let claimed = order.clone();

        self.store.persist(&state.orders).await?;
        Ok(Some(claimed))
    }

    /// Revert to open if still claimed by this character. Idempotent.
    pub async fn release_claim(&self, id: &str, char_name: &str) -> Result<(), OrderBoardError> {
        let mut state = self.state.lock().await;

        let mut changed = false;
        if let Some(order) = state.orders.iter_mut().find(|o| o.id == id) {
            if order.status == OrderStatus::Claimed && order.claimed_by(char_name) {
                order.status = OrderStatus::Open;
                order.claim = None;
                changed = true;
            }
        }

        if changed {
            self.store.persist(&state.orders).await?;
        }
        Ok(())
    }

    /// The bank deposit hook. Credits deposited lines against matching
    /// orders: the depositor's own claims first, then open orders
    /// (opportunistic), spilling across orders as each fills.
    #[instrument(skip(self, items), fields(char = %char_name))]
    pub async fn record_deposits(
        &self,
        char_name: &str,
        items: &[SimpleItem],
    ) -> Result<Vec<Contribution>, OrderBoardError> {
        let now = self.clock.now_ms();
        let mut state = self.state.lock().await;
        let mut contributions = Vec::new();

        for item in items {
            let mut remaining = item.quantity;
            if remaining == 0 {
                continue;
            }

            // Any order with open demand can be credited. Preference, oldest
            // first within each tier: the depositor's own claims, then open
            // orders, then orders under someone else's live lease.
            let mut target_ids: Vec<(OrderId, bool)> = Vec::new();
            let mut matching: Vec<&Order> = state
                .orders
                .iter()
                .filter(|o| o.item_code == item.code && o.remaining_qty > 0)
                .collect();
            matching.sort_by_key(|o| o.created_at_ms);
            for o in matching.iter().filter(|o| o.claimed_by(char_name)) {
                target_ids.push((o.id.clone(), false));
            }
            for o in matching
                .iter()
                .filter(|o| !o.claimed_by(char_name) && o.claimable(now))
            {
                target_ids.push((o.id.clone(), true));
            }
            for o in matching
                .iter()
                .filter(|o| !o.claimed_by(char_name) && !o.claimable(now))
            {
                target_ids.push((o.id.clone(), true));
            }

            for (order_id, opportunistic) in target_ids {
                if remaining == 0 {
                    break;
                }
                let Some(order) = state.orders.iter_mut().find(|o| o.id == order_id) else {
                    continue;
                };

                let credit = order.remaining_qty.min(remaining);
                order.remaining_qty -= credit;
                remaining -= credit;

                if order.remaining_qty == 0 {
                    order.status = OrderStatus::Fulfilled;
                    order.claim = None;
                    info!(order_id = %order.id, item = %order.item_code, "order fulfilled");
                }

                contributions.push(Contribution {
                    order_id: order.id.clone(),
                    item_code: order.item_code.clone(),
                    quantity: credit,
                    status: order.status,
                    opportunistic,
                });
            }
        }

        if !contributions.is_empty() {
            self.store.persist(&state.orders).await?;
        }
        Ok(contributions)
    }

    /// Defensive copy of every order, for the status surface.
    pub async fn snapshot(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

    /// Orders a character could claim right now, unblocked and oldest first.
    pub async fn claimable_for(&self, char_name: &str) -> Vec<Order> {
        let now = self.clock.now_ms();
        let state = self.state.lock().await;
        let mut out: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| o.claimable(now) && o.remaining_qty > 0)
            .filter(|o| !block_applies(&state.blocks, char_name, &o.id, now))
            .cloned()
            .collect();
        out.sort_by_key(|o| o.created_at_ms);
        out
    }

    /// Skip `order_id` for `char_name`. Without an explicit `until`, the
    /// reason's default duration applies (permanent for most reasons).
    pub async fn block_order(
        &self,
        char_name: &str,
        order_id: &str,
        reason: BlockReason,
        until_ms: Option<u64>,
    ) {
        let until_ms = until_ms.or_else(|| {
            reason
                .default_duration_ms()
                .map(|d| self.clock.now_ms() + d)
        });
        warn!(
            char = %char_name,
            order_id = %order_id,
            reason = reason.as_str(),
            "order blocked for character"
        );
        self.state.lock().await.blocks.insert(
            (char_name.to_string(), order_id.to_string()),
            Block { reason, until_ms },
        );
    }

    pub async fn is_blocked(&self, char_name: &str, order_id: &str) -> bool {
        let now = self.clock.now_ms();
        let state = self.state.lock().await;
        block_applies(&state.blocks, char_name, order_id, now)
    }

    /// Wipe the board (control surface). Blocks survive; they are keyed by
    /// order id and simply stop matching.
    pub async fn clear(&self) -> Result<(), OrderBoardError> {
        let mut state = self.state.lock().await;
        let dropped = state.orders.len();
        state.orders.clear();
        self.store.persist(&state.orders).await?;
        info!(dropped, "order board cleared");
        Ok(())
    }

    /// Flush current state; called on shutdown.
    pub async fn flush(&self) -> Result<(), OrderBoardError> {
        let state = self.state.lock().await;
        self.store.persist(&state.orders).await
    }
}

fn block_applies(
    blocks: &HashMap<(String, OrderId), Block>,
    char_name: &str,
    order_id: &str,
    now_ms: u64,
) -> bool {
    match blocks.get(&(char_name.to_string(), order_id.to_string())) {
        Some(block) => block.until_ms.is_none_or(|until| now_ms < until),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceType;
    use crate::store::MemoryStore;
    use common::ManualClock;

    async fn board(clock: Arc<ManualClock>) -> OrderBoard {
        OrderBoard::initialize(Arc::new(MemoryStore::default()), clock)
            .await
            .unwrap()
    }

    fn gather_order(item: &str, source: &str, qty: u32) -> NewOrder {
        NewOrder {
            requester_name: "Smith".into(),
            item_code: item.into(),
            source_type: SourceType::Gather,
            source_code: source.into(),
            recipe_code: None,
            gather_skill: Some(gameapi::Skill::Woodcutting),
            source_level: 1,
            quantity: qty,
        }
    }

    #[tokio::test]
    async fn merge_keeps_id_and_sums_quantities() {
        let clock = ManualClock::shared(1_000);
        let board = board(clock).await;

        let first = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 2))
            .await
            .unwrap();
        let second = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 3))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.requested_qty, 5);
        assert_eq!(second.remaining_qty, 5);
    }

    #[tokio::test]
    async fn different_source_means_different_order() {
        let clock = ManualClock::shared(1_000);
        let board = board(clock).await;

        let a = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 2))
            .await
            .unwrap();
        let b = board
            .create_or_merge(gather_order("birch_wood", "dead_tree", 2))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_lease_expiry() {
        let clock = ManualClock::shared(0);
        let board = board(clock.clone()).await;

        let order = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 2))
            .await
            .unwrap();

        let claimed = board.claim(&order.id, "Worker", 60_000).await.unwrap();
        assert!(claimed.is_some());
        assert!(board.claim(&order.id, "Rival", 60_000).await.unwrap().is_none());

        clock.advance(60_001);
        let reclaimed = board.claim(&order.id, "Rival", 60_000).await.unwrap();
        assert!(reclaimed.is_some(), "expired lease is claimable");
        assert!(reclaimed.unwrap().claimed_by("Rival"));
    }

    #[tokio::test]
    async fn release_claim_is_idempotent_and_owner_scoped() {
        let clock = ManualClock::shared(0);
        let board = board(clock).await;

        let order = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 2))
            .await
            .unwrap();
        board.claim(&order.id, "Worker", 60_000).await.unwrap();

        // A stranger's release is a no-op.
        board.release_claim(&order.id, "Rival").await.unwrap();
        let snap = board.snapshot().await;
        assert_eq!(snap[0].status, OrderStatus::Claimed);

        board.release_claim(&order.id, "Worker").await.unwrap();
        board.release_claim(&order.id, "Worker").await.unwrap();
        let snap = board.snapshot().await;
        assert_eq!(snap[0].status, OrderStatus::Open);
        assert!(snap[0].claim.is_none());
    }

    #[tokio::test]
    async fn deposit_fulfills_claimed_order() {
        let clock = ManualClock::shared(0);
        let board = board(clock).await;

        let order = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 2))
            .await
            .unwrap();
        board.claim(&order.id, "Worker", 60_000).await.unwrap();

        let contributions = board
            .record_deposits("Worker", &[SimpleItem::new("birch_wood", 2)])
            .await
            .unwrap();

        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].quantity, 2);
        assert!(!contributions[0].opportunistic);

        let snap = board.snapshot().await;
        assert_eq!(snap[0].remaining_qty, 0);
        assert_eq!(snap[0].status, OrderStatus::Fulfilled);
        assert!(snap[0].claim.is_none());
    }

    #[tokio::test]
    async fn deposit_prefers_own_claim_then_spills_opportunistically() {
        let clock = ManualClock::shared(0);
        let board = board(clock.clone()).await;

        let mine = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 2))
            .await
            .unwrap();
        clock.advance(10);
        let other = board
            .create_or_merge(gather_order("birch_wood", "dead_tree", 4))
            .await
            .unwrap();
        board.claim(&mine.id, "Worker", 60_000).await.unwrap();

        let contributions = board
            .record_deposits("Worker", &[SimpleItem::new("birch_wood", 5)])
            .await
            .unwrap();

        assert_eq!(contributions.len(), 2);
        assert_eq!(contributions[0].order_id, mine.id);
        assert_eq!(contributions[0].quantity, 2);
        assert!(!contributions[0].opportunistic);
        assert_eq!(contributions[1].order_id, other.id);
        assert_eq!(contributions[1].quantity, 3);
        assert!(contributions[1].opportunistic);

        let snap = board.snapshot().await;
        let other_now = snap.iter().find(|o| o.id == other.id).unwrap();
        assert_eq!(other_now.remaining_qty, 1);
        assert_eq!(other_now.status, OrderStatus::Open);
    }

    #[tokio::test]
    async fn foreign_live_leases_are_credited_last() {
        let clock = ManualClock::shared(0);
        let board = board(clock.clone()).await;

        let leased = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 3))
            .await
            .unwrap();
        clock.advance(10);
        let open = board
            .create_or_merge(gather_order("birch_wood", "dead_tree", 3))
            .await
            .unwrap();
        board.claim(&leased.id, "Rival", 60_000).await.unwrap();

        let contributions = board
            .record_deposits("Worker", &[SimpleItem::new("birch_wood", 4)])
            .await
            .unwrap();

        // The older order is under Rival's lease, so the open one fills
        // first and the lease only absorbs the spill.
        assert_eq!(contributions[0].order_id, open.id);
        assert_eq!(contributions[0].quantity, 3);
        assert_eq!(contributions[1].order_id, leased.id);
        assert_eq!(contributions[1].quantity, 1);

        let total_remaining: u32 = board.snapshot().await.iter().map(|o| o.remaining_qty).sum();
        assert_eq!(total_remaining, 2, "the full deposit reduced open demand");
    }

    #[tokio::test]
    async fn deposit_decrements_by_exactly_min_of_quantity_and_demand() {
        let clock = ManualClock::shared(0);
        let board = board(clock).await;

        board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 3))
            .await
            .unwrap();

        let total_before: u32 = board.snapshot().await.iter().map(|o| o.remaining_qty).sum();
        board
            .record_deposits("Worker", &[SimpleItem::new("birch_wood", 10)])
            .await
            .unwrap();
        let total_after: u32 = board.snapshot().await.iter().map(|o| o.remaining_qty).sum();

        assert_eq!(total_before - total_after, 3, "only open demand is credited");
    }

    #[tokio::test]
    async fn unrelated_deposits_touch_nothing() {
        let clock = ManualClock::shared(0);
        let board = board(clock).await;

        board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 3))
            .await
            .unwrap();
        let contributions = board
            .record_deposits("Worker", &[SimpleItem::new("copper_ore", 10)])
            .await
            .unwrap();
        assert!(contributions.is_empty());
    }

    #[tokio::test]
    async fn blocks_expire_only_when_time_bounded() {
        let clock = ManualClock::shared(0);
        let board = board(clock.clone()).await;

        board
            .block_order("Worker", "ord-1", BlockReason::InsufficientSkill, None)
            .await;
        board
            .block_order("Worker", "ord-2", BlockReason::MissingGatherSource, None)
            .await;

        assert!(board.is_blocked("Worker", "ord-1").await);
        assert!(board.is_blocked("Worker", "ord-2").await);
        assert!(!board.is_blocked("Other", "ord-1").await);

        clock.advance(10 * 60 * 1_000 + 1);
        assert!(board.is_blocked("Worker", "ord-1").await, "permanent within run");
        assert!(!board.is_blocked("Worker", "ord-2").await, "timed block expired");
    }

    #[tokio::test]
    async fn claimable_for_skips_blocked_and_claimed() {
        let clock = ManualClock::shared(0);
        let board = board(clock).await;

        let a = board
            .create_or_merge(gather_order("birch_wood", "birch_tree", 2))
            .await
            .unwrap();
        let b = board
            .create_or_merge(gather_order("ash_wood", "ash_tree", 2))
            .await
            .unwrap();
        let c = board
            .create_or_merge(gather_order("copper_ore", "copper_rocks", 2))
            .await
            .unwrap();

        board.claim(&a.id, "Rival", 60_000).await.unwrap();
        board
            .block_order("Worker", &b.id, BlockReason::NoMapLocation, None)
            .await;

        let visible = board.claimable_for("Worker").await;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, c.id);
    }
}
