use tracing::info;

use crate::bank;
use crate::context::CharacterContext;
use crate::routines::Routine;

/// Buy one bank slot expansion when the roster's gold comfortably covers it.
pub struct BankExpansion;

fn affordable(ctx: &CharacterContext) -> Option<u64> {
    let cfg = &ctx.settings().expansion;
    let details = ctx.services().ledger.details();
    let cost = details.next_expansion_cost;
    if cost == 0 {
        return None;
    }

    let total = ctx.live().gold + details.gold;
    let budget = total.saturating_sub(cfg.gold_buffer);
    let cap = total * cfg.max_gold_pct as u64 / 100;
    (budget >= cost && cost <= cap).then_some(cost)
}

#[async_trait::async_trait]
impl Routine for BankExpansion {
    fn name(&self) -> &'static str {
        "bank_expansion"
    }

    fn priority(&self) -> u32 {
        45
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        let cfg = &ctx.settings().expansion;
        if !cfg.enabled {
            return false;
        }
        let now = ctx.services().clock.now_ms();
        if now.saturating_sub(ctx.last_expansion_check_ms) < cfg.check_interval_ms
            && ctx.last_expansion_check_ms > 0
        {
            return false;
        }
        affordable(ctx).is_some()
    }

    async fn execute(&self, ctx: &mut CharacterContext) -> anyhow::Result<()> {
        ctx.last_expansion_check_ms = ctx.services().clock.now_ms();

        let Some(cost) = affordable(ctx) else {
            return Ok(());
        };

        let carried = ctx.live().gold;
        if carried < cost {
            bank::withdraw_gold(ctx, cost - carried).await?;
        } else {
            bank::travel::ensure_at_bank(ctx).await?;
        }

        ctx.buy_bank_expansion().await?;
        // Slot count and the next cost changed server-side.
        ctx.services().ledger.invalidate("bank expansion purchased");
        info!(character = %ctx.name(), cost, "bank expansion purchased");
        Ok(())
    }
}
