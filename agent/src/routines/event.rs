use tracing::{debug, info};

use combat::{Combatant, hp_needed_for_fight, simulate_fight};
use gameapi::ActiveEvent;

use crate::context::CharacterContext;
use crate::routines::Routine;

/// Participate in configured world events while they are live.
pub struct EventRoutine;

fn monster_rank(kind: &str) -> u8 {
    match kind {
        "normal" => 0,
        "elite" => 1,
        _ => 2,
    }
}

/// The winrate gate: simulated remaining hp as a percentage of max.
fn predicted_winrate(ctx: &CharacterContext, monster: &Combatant) -> Option<u32> {
    let me = Combatant::from(ctx.live());
    let prediction = simulate_fight(&me, monster);
    prediction
        .win
        .then(|| (prediction.remaining_hp.max(0) as u64 * 100 / me.max_hp.max(1) as u64) as u32)
}

fn event_engageable(ctx: &CharacterContext, event: &ActiveEvent) -> bool {
    let cfg = &ctx.settings().event;
    let Some(monster_code) = &event.monster_code else {
        // Gathering events have no fight gate.
        return true;
    };
    let Some(monster) = ctx.services().data.monster(monster_code) else {
        return false;
    };
    if monster_rank(&monster.monster_type) > monster_rank(&cfg.max_monster_type) {
        return false;
    }
    match predicted_winrate(ctx, &Combatant::from(&monster)) {
        Some(winrate) => winrate >= cfg.min_winrate,
        None => false,
    }
}

async fn pick_event(ctx: &CharacterContext) -> Option<ActiveEvent> {
    let cfg = &ctx.settings().event;
    if cfg.events.is_empty() {
        return None;
    }

    let now = ctx.services().clock.now_ms();
    if ctx.last_event_run_ms > 0 && now.saturating_sub(ctx.last_event_run_ms) < cfg.cooldown_ms {
        return None;
    }

    let events = match ctx.services().api.get_active_events().await {
        Ok(events) => events,
        Err(e) => {
            debug!(character = %ctx.name(), error = %e, "event listing failed");
            return None;
        }
    };

    events.into_iter().find(|event| {
        cfg.events.contains(&event.code)
            && event.ends_at_ms.saturating_sub(now) >= cfg.min_time_remaining_ms
            && event_engageable(ctx, event)
    })
}

#[async_trait::async_trait]
impl Routine for EventRoutine {
    fn name(&self) -> &'static str {
        "event"
    }

    fn priority(&self) -> u32 {
        90
    }

    async fn can_run(&self, ctx: &CharacterContext) -> bool {
        pick_event(ctx).await.is_some()
    }

    async fn execute(&self, ctx: &mut CharacterContext) -> anyhow::Result<()> {
        let Some(event) = pick_event(ctx).await else {
            return Ok(());
        };
        ctx.last_event_run_ms = ctx.services().clock.now_ms();
        info!(character = %ctx.name(), event = %event.code, "joining event");

        ctx.move_to(event.x, event.y).await?;

        match &event.monster_code {
            Some(code) => {
                let Some(monster) = ctx.services().data.monster(code) else {
                    return Ok(());
                };
                let me = Combatant::from(ctx.live());
                if let Some(needed) = hp_needed_for_fight(&me, &Combatant::from(&monster)) {
                    while ctx.live().hp < needed {
                        ctx.rest_action().await?;
                    }
                    ctx.fight().await?;
                }
            }
            None => {
                ctx.gather().await?;
            }
        }
        Ok(())
    }
}
