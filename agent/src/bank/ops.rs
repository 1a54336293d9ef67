//! Location-guarded bank operations with the reservation retry ladder.
//!
//! Withdraws run in three stages: plan against the cached bank, reserve the
//! whole plan atomically, then execute line by line. A failed bulk
//! reservation retries once against a forced refresh, then degrades to
//! per-line reservations so partial successes still land. Reservations are
//! released on every path; a leak here would starve the other characters.

use std::collections::HashMap;

use anyhow::Context;
use tracing::{debug, info, warn};

use gameapi::{ApiError, SimpleItem};
use ledger::{DeltaDirection, ReserveOutcome, normalize_lines};
use orders::Contribution;

use crate::bank::travel::ensure_at_bank;
use crate::context::CharacterContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawMode {
    /// Take what the bank can cover, skipping the rest with a reason.
    Partial,
    /// Refuse any line that cannot be filled completely.
    Strict,
}

#[derive(Clone, Debug)]
pub struct WithdrawRequest {
    pub items: Vec<SimpleItem>,
    pub mode: WithdrawMode,
    /// Retry the bulk reservation once against a forced bank refresh.
    pub retry_stale_once: bool,
    /// Turn an empty result into an error.
    pub throw_on_all_skipped: bool,
}

impl WithdrawRequest {
    pub fn partial(items: Vec<SimpleItem>) -> Self {
        Self {
            items,
            mode: WithdrawMode::Partial,
            retry_stale_once: true,
            throw_on_all_skipped: false,
        }
    }

    pub fn strict(items: Vec<SimpleItem>) -> Self {
        Self {
            items,
            mode: WithdrawMode::Strict,
            retry_stale_once: true,
            throw_on_all_skipped: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedLine {
    pub code: String,
    pub requested: u32,
    pub reason: String,
    /// A shortfall that a stale cache could explain; drives the full retry.
    pub stale_suspect: bool,
}

#[derive(Clone, Debug, Default)]
pub struct WithdrawReport {
    pub withdrawn: Vec<SimpleItem>,
    pub skipped: Vec<SkippedLine>,
}

/// Withdraw a batch from the bank, moving there first if needed.
pub async fn withdraw(
    ctx: &mut CharacterContext,
    req: WithdrawRequest,
) -> anyhow::Result<WithdrawReport> {
    ensure_at_bank(ctx).await.context("bank travel failed")?;

    let mut report = withdraw_once(ctx, &req, false).await?;

    // A completely empty result with stale-smelling skips gets one retry
    // from the top against fresh data.
    if report.withdrawn.is_empty() && report.skipped.iter().any(|s| s.stale_suspect) {
        info!(character = %ctx.name(), "zero withdrawn with stale-looking skips, retrying once");
        report = withdraw_once(ctx, &req, true).await?;
    }

    if req.throw_on_all_skipped && report.withdrawn.is_empty() {
        let reasons: Vec<String> = report
            .skipped
            .iter()
            .map(|s| format!("{}: {}", s.code, s.reason))
            .collect();
        anyhow::bail!("withdraw yielded nothing ({})", reasons.join("; "));
    }

    Ok(report)
}

async fn withdraw_once(
    ctx: &mut CharacterContext,
    req: &WithdrawRequest,
    force_refresh: bool,
) -> anyhow::Result<WithdrawReport> {
    let ledger = ctx.services().ledger.clone();
    if force_refresh {
        ledger.get_bank_items(true).await;
    }

    let lines = normalize_lines(&req.items);
    let (mut plan, mut skipped) = build_plan(ctx, &lines, req.mode);
    if plan.is_empty() {
        return Ok(WithdrawReport {
            withdrawn: Vec::new(),
            skipped,
        });
    }

    // Stage two: reserve the whole plan atomically.
    let mut reservation_ids = match ledger.reserve_many(&plan, ctx.name()) {
        ReserveOutcome::Reserved(ids) => Some(ids),
        ReserveOutcome::Insufficient { code, wanted, available } if req.retry_stale_once => {
            debug!(
                character = %ctx.name(),
                code = %code,
                wanted,
                available,
                "bulk reservation failed, refreshing bank and replanning"
            );
            ledger.get_bank_items(true).await;
            let (new_plan, new_skipped) = build_plan(ctx, &lines, req.mode);
            plan = new_plan;
            skipped = new_skipped;
            if plan.is_empty() {
                return Ok(WithdrawReport {
                    withdrawn: Vec::new(),
                    skipped,
                });
            }
            match ledger.reserve_many(&plan, ctx.name()) {
                ReserveOutcome::Reserved(ids) => Some(ids),
                ReserveOutcome::Insufficient { .. } => None,
            }
        }
        ReserveOutcome::Insufficient { .. } => None,
    };

    // Stage three fallback: per-line reservations so partial successes land.
    if reservation_ids.is_none() {
        let mut ids = Vec::with_capacity(plan.len());
        let mut kept = Vec::with_capacity(plan.len());
        for line in plan {
            match ledger.reserve(&line.code, line.quantity, ctx.name()) {
                Some(id) => {
                    ids.push(id);
                    kept.push(line);
                }
                None => skipped.push(SkippedLine {
                    code: line.code.clone(),
                    requested: line.quantity,
                    reason: format!(
                        "reservation failed ({} available)",
                        ledger.available_bank_count(&line.code, None)
                    ),
                    stale_suspect: true,
                }),
            }
        }
        plan = kept;
        reservation_ids = Some(ids);
    }

    let reservation_ids = reservation_ids.unwrap_or_default();
    let mut withdrawn = Vec::new();

    for (line, reservation_id) in plan.into_iter().zip(reservation_ids) {
        match execute_line(ctx, &line).await {
            Ok(()) => {
                ledger.apply_bank_delta(ctx.name(), DeltaDirection::Withdraw, &[line.clone()]);
                ledger.release(reservation_id);
                withdrawn.push(line);
            }
            Err(LineFailure::Skip { reason, stale_suspect }) => {
                ledger.release(reservation_id);
                if stale_suspect {
                    ledger.invalidate("withdraw availability error");
                }
                skipped.push(SkippedLine {
                    code: line.code.clone(),
                    requested: line.quantity,
                    reason,
                    stale_suspect,
                });
            }
            Err(LineFailure::Fatal(e)) => {
                ledger.release(reservation_id);
                return Err(e).context("withdraw aborted");
            }
        }
    }

    Ok(WithdrawReport { withdrawn, skipped })
}

enum LineFailure {
    Skip { reason: String, stale_suspect: bool },
    Fatal(anyhow::Error),
}

/// One API withdraw. Location faults re-anchor and retry once without
/// touching the cache; availability faults skip the line and flag the cache.
async fn execute_line(ctx: &mut CharacterContext, line: &SimpleItem) -> Result<(), LineFailure> {
    match ctx.withdraw_line(line).await {
        Ok(()) => Ok(()),
        Err(ApiError::BankLocation) => {
            warn!(character = %ctx.name(), code = %line.code, "withdraw hit a position fault, re-anchoring");
            ensure_at_bank(ctx)
                .await
                .map_err(LineFailure::Fatal)?;
            match ctx.withdraw_line(line).await {
                Ok(()) => Ok(()),
                Err(e) => Err(LineFailure::Skip {
                    reason: format!("bank not reachable: {e}"),
                    stale_suspect: false,
                }),
            }
        }
        Err(ApiError::BankAvailability(message)) => Err(LineFailure::Skip {
            reason: message,
            stale_suspect: true,
        }),
        Err(e) => Err(LineFailure::Fatal(e.into())),
    }
}

/// Stage one: figure out what can actually be taken, against availability,
/// carry capacity and unique-slot capacity.
fn build_plan(
    ctx: &CharacterContext,
    lines: &[SimpleItem],
    mode: WithdrawMode,
) -> (Vec<SimpleItem>, Vec<SkippedLine>) {
    let ledger = ctx.services().ledger.clone();
    let mut plan = Vec::with_capacity(lines.len());
    let mut skipped = Vec::new();

    let mut space = ctx
        .inventory_capacity()
        .saturating_sub(ctx.inventory_count());
    let mut free_slots = ctx.inventory_free_slots();

    for line in lines {
        let available = ledger.available_bank_count(&line.code, None);
        if available == 0 {
            skipped.push(SkippedLine {
                code: line.code.clone(),
                requested: line.quantity,
                reason: format!("not available in bank (0/{})", line.quantity),
                stale_suspect: true,
            });
            continue;
        }

        let mut take = line.quantity;
        if available < take {
            match mode {
                WithdrawMode::Strict => {
                    skipped.push(SkippedLine {
                        code: line.code.clone(),
                        requested: line.quantity,
                        reason: format!("only {available}/{take} available"),
                        stale_suspect: true,
                    });
                    continue;
                }
                WithdrawMode::Partial => take = available,
            }
        }

        if space == 0 {
            skipped.push(SkippedLine {
                code: line.code.clone(),
                requested: line.quantity,
                reason: "no inventory space".into(),
                stale_suspect: false,
            });
            continue;
        }
        if space < take {
            match mode {
                WithdrawMode::Strict => {
                    skipped.push(SkippedLine {
                        code: line.code.clone(),
                        requested: line.quantity,
                        reason: format!("inventory space {space}/{take}"),
                        stale_suspect: false,
                    });
                    continue;
                }
                WithdrawMode::Partial => take = space,
            }
        }

        // A code we do not carry yet consumes one of the finite slots.
        let needs_slot = ctx.item_count(&line.code) == 0;
        if needs_slot {
            if free_slots == 0 {
                skipped.push(SkippedLine {
                    code: line.code.clone(),
                    requested: line.quantity,
                    reason: "no free inventory slot".into(),
                    stale_suspect: false,
                });
                continue;
            }
            free_slots -= 1;
        }

        space -= take;
        if take < line.quantity {
            skipped.push(SkippedLine {
                code: line.code.clone(),
                requested: line.quantity,
                reason: format!("partial fill {take}/{}", line.quantity),
                stale_suspect: true,
            });
        }
        plan.push(SimpleItem::new(line.code.clone(), take));
    }

    (plan, skipped)
}

/// Deposit lines into the bank and feed the order-board hook with whatever
/// actually landed.
pub async fn deposit(
    ctx: &mut CharacterContext,
    items: Vec<SimpleItem>,
) -> anyhow::Result<Vec<Contribution>> {
    let lines = normalize_lines(&items);
    if lines.is_empty() {
        return Ok(Vec::new());
    }
    ensure_at_bank(ctx).await.context("bank travel failed")?;

    let ledger = ctx.services().ledger.clone();
    let mut deposited = Vec::new();
    let mut failure: Option<ApiError> = None;

    for line in &lines {
        let outcome = match ctx.deposit_lines(std::slice::from_ref(line)).await {
            Err(ApiError::BankLocation) => {
                warn!(character = %ctx.name(), "deposit hit a position fault, re-anchoring");
                ensure_at_bank(ctx).await.context("bank travel failed")?;
                ctx.deposit_lines(std::slice::from_ref(line)).await
            }
            other => other,
        };
        match outcome {
            Ok(()) => {
                ledger.apply_bank_delta(ctx.name(), DeltaDirection::Deposit, std::slice::from_ref(line));
                deposited.push(line.clone());
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    // Landed lines are credited even when a later line failed.
    let contributions = ctx
        .services()
        .orders
        .record_deposits(ctx.name(), &deposited)
        .await?;
    for c in &contributions {
        debug!(
            character = %ctx.name(),
            order_id = %c.order_id,
            item = %c.item_code,
            qty = c.quantity,
            opportunistic = c.opportunistic,
            "deposit credited an order"
        );
    }

    match failure {
        Some(e) => Err(anyhow::Error::from(e).context("deposit aborted")),
        None => Ok(contributions),
    }
}

/// Deposit the whole inventory minus per-code keeps.
pub async fn deposit_all(
    ctx: &mut CharacterContext,
    keep_by_code: &HashMap<String, u32>,
) -> anyhow::Result<Vec<Contribution>> {
    let mut lines = Vec::new();
    for (code, carried) in ctx.carried_counts() {
        let keep = keep_by_code.get(&code).copied().unwrap_or(0);
        if carried > keep {
            lines.push(SimpleItem::new(code, carried - keep));
        }
    }
    deposit(ctx, lines).await
}

/// Bank the carried gold above `buffer`.
pub async fn deposit_gold_above(ctx: &mut CharacterContext, buffer: u64) -> anyhow::Result<u64> {
    let carried = ctx.live().gold;
    if carried <= buffer {
        return Ok(0);
    }
    let amount = carried - buffer;
    ensure_at_bank(ctx).await.context("bank travel failed")?;
    ctx.deposit_gold(amount).await?;
    ctx.services()
        .ledger
        .apply_gold_delta(DeltaDirection::Deposit, amount);
    Ok(amount)
}

/// Pull gold out of the bank, location-guarded.
pub async fn withdraw_gold(ctx: &mut CharacterContext, amount: u64) -> anyhow::Result<()> {
    if amount == 0 {
        return Ok(());
    }
    ensure_at_bank(ctx).await.context("bank travel failed")?;
    ctx.withdraw_gold(amount).await?;
    ctx.services()
        .ledger
        .apply_gold_delta(DeltaDirection::Withdraw, amount);
    Ok(())
}
