use std::collections::HashMap;

use tracing::debug;

use crate::bank;
use crate::context::CharacterContext;
use crate::routines::Routine;

/// Empty the inventory into the bank once it crosses the fill threshold.
/// Optionally sells listed codes, recycles surplus equipment and banks gold
/// on the same trip.
pub struct DepositBank;

#[async_trait::async_trait]
impl Routine for DepositBank {
    fn name(&self) -> &'static str {
        "deposit_bank"
    }

    fn priority(&self) -> u32 {
        50
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        let capacity = ctx.inventory_capacity();
        capacity > 0 && ctx.inventory_count() * 100 >= ctx.settings().deposit.threshold_pct * capacity
    }

    async fn execute(&self, ctx: &mut CharacterContext) -> anyhow::Result<()> {
        let cfg = ctx.settings().deposit.clone();

        if !cfg.sell_codes.is_empty() {
            sell_listed(ctx, &cfg.sell_codes).await?;
        }
        if cfg.recycle_duplicates {
            recycle_surplus_equipment(ctx).await;
        }

        let mut keeps: HashMap<String, u32> = cfg
            .keep_by_code
            .iter()
            .map(|k| (k.code.clone(), k.quantity))
            .collect();
        if cfg.keep_task_materials {
            if let Some(task) = &ctx.live().task {
                if task.kind == "items" {
                    let outstanding = task.total.saturating_sub(task.progress);
                    let keep = keeps.entry(task.code.clone()).or_insert(0);
                    *keep = (*keep).max(outstanding);
                }
            }
        }

        bank::deposit_all(ctx, &keeps).await?;

        if cfg.deposit_gold {
            bank::deposit_gold_above(ctx, cfg.gold_buffer).await?;
        }
        Ok(())
    }
}

/// Sell the configured codes at the grand exchange, when one is mapped.
async fn sell_listed(ctx: &mut CharacterContext, sell_codes: &[String]) -> anyhow::Result<()> {
    let data = ctx.services().data.clone();
    let mut spots = data.locations_of("grand_exchange", "grand_exchange");
    if spots.is_empty() {
        spots = data.locations_of("grand_exchange", "");
    }
    let Some((x, y)) = spots.first().copied() else {
        debug!(character = %ctx.name(), "no grand exchange mapped, skipping sell pass");
        return Ok(());
    };

    let to_sell: Vec<(String, u32)> = sell_codes
        .iter()
        .map(|code| (code.clone(), ctx.item_count(code)))
        .filter(|(_, qty)| *qty > 0)
        .collect();
    if to_sell.is_empty() {
        return Ok(());
    }

    ctx.move_to(x, y).await?;
    for (code, quantity) in to_sell {
        if let Err(e) = ctx.sell(&code, quantity).await {
            debug!(character = %ctx.name(), code = %code, error = %e, "sell skipped");
        }
    }
    Ok(())
}

/// Recycle carried equipment the roster already owns copies of elsewhere.
async fn recycle_surplus_equipment(ctx: &mut CharacterContext) {
    let data = ctx.services().data.clone();
    let ledger = ctx.services().ledger.clone();

    let candidates: Vec<(String, u32)> = ctx
        .carried_counts()
        .into_iter()
        .filter(|(code, quantity)| {
            data.item(code).is_some_and(|item| item.is_equipment())
                && ledger.global_count(code) > *quantity
        })
        .collect();

    for (code, quantity) in candidates {
        match ctx.recycle(&code, quantity).await {
            Ok(()) => debug!(character = %ctx.name(), code = %code, quantity, "recycled surplus"),
            Err(e) => debug!(character = %ctx.name(), code = %code, error = %e, "recycle skipped"),
        }
    }
}
