//! The fallback rotation: a weighted mix of order work, combat grinding,
//! gathering, crafting, task progress and achievement chasing.
//!
//! Branch selection is a deterministic weighted round-robin over the
//! configured weights, driven by a per-character tick counter, so two runs
//! with the same history pick the same branches.

use std::str::FromStr;

use tracing::{debug, info, warn};

use combat::{Combatant, can_beat_monster, hp_needed_for_fight};
use gameapi::{MonsterData, Recipe, SimpleItem, Skill};
use orders::{BlockReason, NewOrder, Order, SourceType};
use settings::RotationSettings;

use crate::bank;
use crate::bank::ops::WithdrawRequest;
use crate::context::CharacterContext;
use crate::routines::Routine;
use crate::routines::task::tasks_master_location;

const ORDER_LEASE_MS: u64 = 10 * 60 * 1_000;

pub struct SkillRotation;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Branch {
    Orders,
    Combat,
    Gathering,
    Crafting,
    Task,
    Achievement,
}

fn pick_branch(weights: &RotationSettings, tick: u64) -> Branch {
    let table = [
        (Branch::Orders, weights.orders),
        (Branch::Combat, weights.combat),
        (Branch::Gathering, weights.gathering),
        (Branch::Crafting, weights.crafting),
        (Branch::Task, weights.task),
        (Branch::Achievement, weights.achievement),
    ];
    let total: u64 = table.iter().map(|(_, w)| *w as u64).sum();
    if total == 0 {
        return Branch::Combat;
    }

    let mut slot = tick % total;
    for (branch, weight) in table {
        if slot < weight as u64 {
            return branch;
        }
        slot -= weight as u64;
    }
    Branch::Combat
}

#[async_trait::async_trait]
impl Routine for SkillRotation {
    fn name(&self) -> &'static str {
        "skill_rotation"
    }

    fn priority(&self) -> u32 {
        5
    }

    async fn can_run(&self, _ctx: &CharacterContext) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut CharacterContext) -> anyhow::Result<()> {
        ctx.rotation_tick += 1;
        let branch = pick_branch(&ctx.settings().rotation, ctx.rotation_tick);
        debug!(character = %ctx.name(), ?branch, "rotation branch");

        match branch {
            Branch::Orders => run_orders(ctx).await,
            Branch::Combat => run_combat(ctx).await,
            Branch::Gathering => run_gathering(ctx, None).await,
            Branch::Crafting => run_crafting(ctx).await,
            Branch::Task => run_task(ctx).await,
            Branch::Achievement => run_achievement(ctx).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Orders branch
// ---------------------------------------------------------------------------

enum OrderWork {
    Gather { x: i32, y: i32 },
    Fight { x: i32, y: i32, monster: MonsterData },
    Craft { x: i32, y: i32, recipe: Recipe, craft_code: String },
}

enum Verdict {
    Ready(OrderWork),
    Blocked(BlockReason),
    /// Not workable right now, but someone else (or later) might manage.
    Pass,
}

async fn assess_order(ctx: &CharacterContext, order: &Order) -> Verdict {
    let data = ctx.services().data.clone();

    match order.source_type {
        SourceType::Gather => {
            let skill = order
                .gather_skill
                .or_else(|| data.resource(&order.source_code).and_then(|r| r.skill));
            let Some(skill) = skill else {
                return Verdict::Blocked(BlockReason::MissingGatherSource);
            };
            if ctx.skill_level(skill) < order.source_level {
                return Verdict::Blocked(BlockReason::InsufficientSkill);
            }
            match data.locations_of("resource", &order.source_code).first() {
                Some((x, y)) => Verdict::Ready(OrderWork::Gather { x: *x, y: *y }),
                None => Verdict::Blocked(BlockReason::MissingGatherSource),
            }
        }
        SourceType::Fight => {
            let Some(monster) = data.monster(&order.source_code) else {
                return Verdict::Blocked(BlockReason::NoMapLocation);
            };
            if ctx.skill_level(Skill::Combat) < order.source_level {
                return Verdict::Blocked(BlockReason::InsufficientSkill);
            }
            let me = Combatant::from(ctx.live());
            if !can_beat_monster(&me, &Combatant::from(&monster)) {
                return Verdict::Blocked(BlockReason::InsufficientSkill);
            }

            if let Some((x, y)) = data.locations_of("monster", &order.source_code).first() {
                return Verdict::Ready(OrderWork::Fight {
                    x: *x,
                    y: *y,
                    monster,
                });
            }
            if monster.event_only {
                // Only an active event puts this monster on the map.
                let spot = match ctx.services().api.get_active_events().await {
                    Ok(events) => events
                        .into_iter()
                        .find(|e| e.monster_code.as_deref() == Some(order.source_code.as_str()))
                        .map(|e| (e.x, e.y)),
                    Err(_) => None,
                };
                return match spot {
                    Some((x, y)) => Verdict::Ready(OrderWork::Fight { x, y, monster }),
                    None => Verdict::Blocked(BlockReason::EventOnlyNotActive),
                };
            }
            Verdict::Blocked(BlockReason::NoMapLocation)
        }
        SourceType::Craft => {
            let recipe = order
                .recipe_code
                .as_deref()
                .and_then(|code| data.item(code))
                .and_then(|item| item.craft)
                .or_else(|| data.item(&order.item_code).and_then(|item| item.craft));
            let Some(recipe) = recipe else {
                return Verdict::Blocked(BlockReason::NoMapLocation);
            };
            let Some(skill) = recipe.skill else {
                return Verdict::Blocked(BlockReason::NoMapLocation);
            };
            if ctx.skill_level(skill) < recipe.level.max(order.source_level) {
                return Verdict::Blocked(BlockReason::InsufficientSkill);
            }
            let Some((x, y)) = data.locations_of("workshop", skill.as_str()).first().copied()
            else {
                return Verdict::Blocked(BlockReason::NoMapLocation);
            };

            // Bank must cover at least one unit right now; otherwise leave
            // the order on the board.
            let ledger = ctx.services().ledger.clone();
            let covered = recipe.items.iter().all(|mat| {
                ledger.available_bank_count(&mat.code, Some(ctx.name())) >= mat.quantity
            });
            if !covered {
                return Verdict::Pass;
            }

            let craft_code = order
                .recipe_code
                .clone()
                .unwrap_or_else(|| order.item_code.clone());
            Verdict::Ready(OrderWork::Craft {
                x,
                y,
                recipe,
                craft_code,
            })
        }
    }
}

async fn run_orders(ctx: &mut CharacterContext) -> anyhow::Result<()> {
    let orders = ctx.services().orders.clone();
    let candidates = orders.claimable_for(ctx.name()).await;

    for order in candidates {
        match assess_order(ctx, &order).await {
            Verdict::Ready(work) => {
                let Some(claimed) = orders.claim(&order.id, ctx.name(), ORDER_LEASE_MS).await?
                else {
                    continue;
                };
                info!(
                    character = %ctx.name(),
                    order_id = %claimed.id,
                    item = %claimed.item_code,
                    "order claimed"
                );
                return run_claimed_order(ctx, claimed, work).await;
            }
            Verdict::Blocked(reason) => {
                orders.block_order(ctx.name(), &order.id, reason, None).await;
            }
            Verdict::Pass => {}
        }
    }
    Ok(())
}

async fn run_claimed_order(
    ctx: &mut CharacterContext,
    order: Order,
    work: OrderWork,
) -> anyhow::Result<()> {
    let result = work_order(ctx, &order, work).await;

    // Whatever got produced lands in the bank and credits the order through
    // the deposit hook, even when the work loop failed partway.
    let produced = ctx.item_count(&order.item_code);
    if produced > 0 {
        if let Err(e) = bank::deposit(
            ctx,
            vec![SimpleItem::new(order.item_code.clone(), produced)],
        )
        .await
        {
            warn!(character = %ctx.name(), order_id = %order.id, error = %e, "order deposit failed");
        }
    }
    ctx.services()
        .orders
        .release_claim(&order.id, ctx.name())
        .await?;
    result
}

async fn work_order(
    ctx: &mut CharacterContext,
    order: &Order,
    work: OrderWork,
) -> anyhow::Result<()> {
    let space = ctx
        .inventory_capacity()
        .saturating_sub(ctx.inventory_count())
        .max(1);
    let target = order.remaining_qty.min(space);

    match work {
        OrderWork::Gather { x, y } => {
            ctx.move_to(x, y).await?;
            let mut attempts = 0;
            while ctx.item_count(&order.item_code) < target && attempts < target * 5 {
                ctx.gather().await?;
                attempts += 1;
            }
        }
        OrderWork::Fight { x, y, monster } => {
            ctx.move_to(x, y).await?;
            let opponent = Combatant::from(&monster);
            let mut attempts = 0;
            while ctx.item_count(&order.item_code) < target && attempts < target * 5 {
                let me = Combatant::from(ctx.live());
                let Some(needed) = hp_needed_for_fight(&me, &opponent) else {
                    anyhow::bail!("monster '{}' no longer beatable", monster.code);
                };
                while ctx.live().hp < needed {
                    ctx.rest_action().await?;
                }
                ctx.fight().await?;
                attempts += 1;
            }
        }
        OrderWork::Craft {
            x,
            y,
            recipe,
            craft_code,
        } => {
            let per_batch: u32 = recipe.items.iter().map(|m| m.quantity).sum();
            let by_space = if per_batch == 0 { target } else { space / per_batch };
            let batch = target.min(by_space).max(1);

            let lines: Vec<SimpleItem> = recipe
                .items
                .iter()
                .map(|m| SimpleItem::new(m.code.clone(), m.quantity * batch))
                .collect();
            let wanted = lines.len();
            let report = bank::withdraw(ctx, WithdrawRequest::strict(lines)).await?;
            if report.withdrawn.len() != wanted {
                anyhow::bail!("craft materials incomplete for '{craft_code}'");
            }

            ctx.move_to(x, y).await?;
            ctx.craft(&craft_code, batch).await?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Grind branches
// ---------------------------------------------------------------------------

async fn ensure_hp(ctx: &mut CharacterContext, needed: i32) -> anyhow::Result<()> {
    while ctx.live().hp < needed {
        ctx.rest_action().await?;
    }
    Ok(())
}

async fn run_combat(ctx: &mut CharacterContext) -> anyhow::Result<()> {
    let data = ctx.services().data.clone();
    let me = Combatant::from(ctx.live());

    let mut best: Option<(MonsterData, (i32, i32))> = None;
    for monster in data.monsters() {
        if monster.event_only {
            continue;
        }
        let Some(spot) = data.locations_of("monster", &monster.code).first().copied() else {
            continue;
        };
        if !can_beat_monster(&me, &Combatant::from(&monster)) {
            continue;
        }
        if best.as_ref().is_none_or(|(b, _)| monster.level > b.level) {
            best = Some((monster, spot));
        }
    }

    let Some((monster, (x, y))) = best else {
        debug!(character = %ctx.name(), "no beatable monster mapped");
        return Ok(());
    };

    ctx.move_to(x, y).await?;
    let me = Combatant::from(ctx.live());
    if let Some(needed) = hp_needed_for_fight(&me, &Combatant::from(&monster)) {
        ensure_hp(ctx, needed).await?;
        ctx.fight().await?;
    }
    Ok(())
}

async fn run_gathering(
    ctx: &mut CharacterContext,
    skill_filter: Option<Skill>,
) -> anyhow::Result<()> {
    let data = ctx.services().data.clone();

    let mut best: Option<(gameapi::ResourceData, (i32, i32))> = None;
    for resource in data.resources() {
        let Some(skill) = resource.skill else {
            continue;
        };
        if skill_filter.is_some_and(|wanted| wanted != skill) {
            continue;
        }
        if ctx.skill_level(skill) < resource.level {
            continue;
        }
        let Some(spot) = data.locations_of("resource", &resource.code).first().copied() else {
            continue;
        };
        if best.as_ref().is_none_or(|(b, _)| resource.level > b.level) {
            best = Some((resource, spot));
        }
    }

    let Some((resource, (x, y))) = best else {
        debug!(character = %ctx.name(), "no gatherable resource mapped");
        return Ok(());
    };

    ctx.move_to(x, y).await?;
    ctx.gather().await?;
    debug!(character = %ctx.name(), resource = %resource.code, "gathered");
    Ok(())
}

async fn run_crafting(ctx: &mut CharacterContext) -> anyhow::Result<()> {
    let data = ctx.services().data.clone();
    let ledger = ctx.services().ledger.clone();

    let mut best: Option<(String, Recipe, (i32, i32))> = None;
    for item in data.items() {
        let Some(recipe) = item.craft.clone() else {
            continue;
        };
        let Some(skill) = recipe.skill else {
            continue;
        };
        if ctx.skill_level(skill) < recipe.level {
            continue;
        }
        let covered = recipe
            .items
            .iter()
            .all(|mat| ledger.available_bank_count(&mat.code, Some(ctx.name())) >= mat.quantity);
        if !covered {
            continue;
        }
        let Some(spot) = data.locations_of("workshop", skill.as_str()).first().copied() else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, b, _)| recipe.level > b.level) {
            best = Some((item.code.clone(), recipe, spot));
        }
    }

    let Some((code, recipe, (x, y))) = best else {
        debug!(character = %ctx.name(), "nothing craftable from bank stock");
        return Ok(());
    };

    let lines: Vec<SimpleItem> = recipe
        .items
        .iter()
        .map(|m| SimpleItem::new(m.code.clone(), m.quantity))
        .collect();
    let wanted = lines.len();
    let report = bank::withdraw(ctx, WithdrawRequest::strict(lines)).await?;
    if report.withdrawn.len() != wanted {
        anyhow::bail!("craft materials incomplete for '{code}'");
    }

    ctx.move_to(x, y).await?;
    ctx.craft(&code, 1).await?;
    Ok(())
}

async fn run_task(ctx: &mut CharacterContext) -> anyhow::Result<()> {
    let Some(task) = ctx.live().task.clone() else {
        // No task yet: go get one.
        let Some((x, y)) = tasks_master_location(ctx, "monsters") else {
            debug!(character = %ctx.name(), "no tasks master mapped");
            return Ok(());
        };
        ctx.move_to(x, y).await?;
        ctx.accept_task().await?;
        return Ok(());
    };

    if task.kind == "monsters" {
        let data = ctx.services().data.clone();
        let Some(monster) = data.monster(&task.code) else {
            return Ok(());
        };
        let me = Combatant::from(ctx.live());
        if !can_beat_monster(&me, &Combatant::from(&monster)) {
            debug!(character = %ctx.name(), monster = %task.code, "task monster too strong");
            return Ok(());
        }
        let Some((x, y)) = data.locations_of("monster", &task.code).first().copied() else {
            return Ok(());
        };
        ctx.move_to(x, y).await?;
        if let Some(needed) = hp_needed_for_fight(&me, &Combatant::from(&monster)) {
            ensure_hp(ctx, needed).await?;
            ctx.fight().await?;
        }
        return Ok(());
    }

    // Item tasks get delegated to the order board so any character can help.
    let outstanding = task
        .total
        .saturating_sub(task.progress)
        .saturating_sub(ctx.item_count(&task.code));
    if outstanding == 0 {
        return Ok(());
    }
    let Some(request) = order_for_item(ctx, &task.code, outstanding) else {
        debug!(character = %ctx.name(), item = %task.code, "no known source for task item");
        return Ok(());
    };
    ctx.services().orders.create_or_merge(request).await?;
    Ok(())
}

/// Resolve an item to a source the order board understands.
fn order_for_item(ctx: &CharacterContext, code: &str, quantity: u32) -> Option<NewOrder> {
    let data = ctx.services().data.clone();

    if let Some(recipe) = data.item(code).and_then(|item| item.craft) {
        return Some(NewOrder {
            requester_name: ctx.name().to_string(),
            item_code: code.to_string(),
            source_type: SourceType::Craft,
            source_code: code.to_string(),
            recipe_code: Some(code.to_string()),
            gather_skill: None,
            source_level: recipe.level,
            quantity,
        });
    }

    let resource = data
        .resources()
        .into_iter()
        .find(|r| r.drops.iter().any(|d| d.code == code))?;
    Some(NewOrder {
        requester_name: ctx.name().to_string(),
        item_code: code.to_string(),
        source_type: SourceType::Gather,
        source_code: resource.code.clone(),
        recipe_code: None,
        gather_skill: resource.skill,
        source_level: resource.level,
        quantity,
    })
}

async fn run_achievement(ctx: &mut CharacterContext) -> anyhow::Result<()> {
    let target = match ctx.services().api.get_achievements(1, 50).await {
        Ok(page) => page
            .items
            .iter()
            .filter(|a| a.progress < a.total)
            .find_map(|a| a.skill.as_deref().and_then(|s| Skill::from_str(s).ok())),
        Err(e) => {
            debug!(character = %ctx.name(), error = %e, "achievement listing failed");
            None
        }
    };
    run_gathering(ctx, target).await
}
