//! Time-optimal bank travel: direct walk vs teleport potions.

use tracing::{debug, warn};

use settings::{BankTravelMode, BankTravelSettings};

use crate::bank::tiles::{BankTile, manhattan, nearest_tile};
use crate::context::CharacterContext;

/// Known travel potions and where they teleport.
const TRAVEL_POTIONS: [(&str, (i32, i32)); 2] =
    [("recall_potion", (0, 0)), ("forest_bank_potion", (7, 13))];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TravelMethod {
    Direct,
    Potion {
        code: String,
        teleport_to: (i32, i32),
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TravelPlan {
    pub method: TravelMethod,
    pub bank: BankTile,
    pub est_seconds: u64,
}

/// Pure planner: estimate each admissible method and keep the cheapest,
/// requiring the configured savings before leaving the direct walk.
pub fn plan_bank_travel(
    origin: (i32, i32),
    tiles: &[BankTile],
    carried_potions: &[(String, (i32, i32))],
    settings: &BankTravelSettings,
) -> Option<TravelPlan> {
    let direct_bank = nearest_tile(origin, tiles)?;
    let direct_seconds = manhattan(origin, direct_bank.pos()) * settings.move_seconds_per_tile;
    let direct = TravelPlan {
        method: TravelMethod::Direct,
        bank: direct_bank,
        est_seconds: direct_seconds,
    };

    if settings.mode == BankTravelMode::Direct {
        return Some(direct);
    }

    let mut best_potion: Option<TravelPlan> = None;
    for (code, teleport_to) in carried_potions {
        let Some(bank) = nearest_tile(*teleport_to, tiles) else {
            continue;
        };
        let mut seconds = settings.item_use_seconds
            + manhattan(*teleport_to, bank.pos()) * settings.move_seconds_per_tile;
        if settings.include_return_to_origin {
            seconds += manhattan(bank.pos(), origin) * settings.move_seconds_per_tile;
        }
        let plan = TravelPlan {
            method: TravelMethod::Potion {
                code: code.clone(),
                teleport_to: *teleport_to,
            },
            bank,
            est_seconds: seconds,
        };
        if best_potion
            .as_ref()
            .is_none_or(|b| plan.est_seconds < b.est_seconds)
        {
            best_potion = Some(plan);
        }
    }

    match best_potion {
        Some(potion)
            if direct.est_seconds.saturating_sub(potion.est_seconds)
                >= settings.min_savings_seconds =>
        {
            Some(potion)
        }
        _ => Some(direct),
    }
}

/// Potions this character can use right now, filtered by settings, carried
/// stock and the item's own use conditions.
fn admissible_potions(ctx: &CharacterContext) -> Vec<(String, (i32, i32))> {
    let travel = &ctx.services().travel;
    TRAVEL_POTIONS
        .iter()
        .filter(|(code, _)| match *code {
            "recall_potion" => travel.allow_recall,
            _ => travel.allow_forest_bank,
        })
        .filter(|(code, _)| ctx.has_item(code, 1))
        .filter(|(code, _)| {
            ctx.services()
                .data
                .item(code)
                .map(|item| item.conditions_met(ctx.live()))
                .unwrap_or(true)
        })
        .map(|(code, dest)| ((*code).to_string(), *dest))
        .collect()
}

/// Put the character on a bank tile, choosing the cheapest route. A failed
/// potion use degrades to the direct walk from the origin.
pub async fn ensure_at_bank(ctx: &mut CharacterContext) -> anyhow::Result<BankTile> {
    let tiles = ctx.services().tiles.tiles().await;
    if let Some(here) = tiles.iter().find(|t| ctx.is_at(t.x, t.y)) {
        return Ok(*here);
    }

    let origin = (ctx.live().x, ctx.live().y);
    let potions = admissible_potions(ctx);
    let travel = ctx.services().travel.clone();

    let plan = plan_bank_travel(origin, &tiles, &potions, &travel)
        .ok_or_else(|| anyhow::anyhow!("no bank tile known"))?;
    debug!(
        character = %ctx.name(),
        method = ?plan.method,
        bank_x = plan.bank.x,
        bank_y = plan.bank.y,
        est_seconds = plan.est_seconds,
        "bank travel planned"
    );

    match &plan.method {
        TravelMethod::Direct => {
            ctx.move_to(plan.bank.x, plan.bank.y).await?;
            Ok(plan.bank)
        }
        TravelMethod::Potion { code, .. } => match ctx.use_item(code, 1).await {
            Ok(()) => {
                ctx.move_to(plan.bank.x, plan.bank.y).await?;
                Ok(plan.bank)
            }
            Err(e) => {
                warn!(
                    character = %ctx.name(),
                    potion = %code,
                    error = %e,
                    "travel potion failed, walking instead"
                );
                let fallback = nearest_tile(origin, &tiles)
                    .ok_or_else(|| anyhow::anyhow!("no bank tile known"))?;
                ctx.move_to(fallback.x, fallback.y).await?;
                Ok(fallback)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles() -> Vec<BankTile> {
        vec![BankTile { x: 4, y: 1 }, BankTile { x: 7, y: 13 }]
    }

    fn smart_settings() -> BankTravelSettings {
        BankTravelSettings {
            mode: BankTravelMode::Smart,
            allow_recall: true,
            allow_forest_bank: true,
            min_savings_seconds: 10,
            include_return_to_origin: false,
            move_seconds_per_tile: 5,
            item_use_seconds: 3,
        }
    }

    #[test]
    fn near_bank_walks_directly() {
        let plan = plan_bank_travel(
            (5, 2),
            &tiles(),
            &[("recall_potion".into(), (0, 0))],
            &smart_settings(),
        )
        .unwrap();
        assert_eq!(plan.method, TravelMethod::Direct);
        assert_eq!(plan.est_seconds, 10);
    }

    #[test]
    fn distant_origin_prefers_potion_with_enough_savings() {
        // 20 tiles from the nearest bank: direct = 100 s, recall = 3 + 5*5 = 28 s.
        let plan = plan_bank_travel(
            (24, 1),
            &tiles(),
            &[("recall_potion".into(), (0, 0))],
            &smart_settings(),
        )
        .unwrap();
        assert!(matches!(plan.method, TravelMethod::Potion { ref code, .. } if code == "recall_potion"));
        assert_eq!(plan.bank, BankTile { x: 4, y: 1 });
        assert_eq!(plan.est_seconds, 28);
    }

    #[test]
    fn small_savings_stay_direct() {
        let mut settings = smart_settings();
        settings.min_savings_seconds = 1_000;
        let plan = plan_bank_travel(
            (24, 1),
            &tiles(),
            &[("recall_potion".into(), (0, 0))],
            &settings,
        )
        .unwrap();
        assert_eq!(plan.method, TravelMethod::Direct);
    }

    #[test]
    fn direct_mode_ignores_potions() {
        let mut settings = smart_settings();
        settings.mode = BankTravelMode::Direct;
        let plan = plan_bank_travel(
            (40, 40),
            &tiles(),
            &[("recall_potion".into(), (0, 0))],
            &settings,
        )
        .unwrap();
        assert_eq!(plan.method, TravelMethod::Direct);
    }

    #[test]
    fn return_leg_counts_when_configured() {
        let mut settings = smart_settings();
        settings.include_return_to_origin = true;
        // Return leg (bank (4,1) -> origin (24,1) = 20 tiles = 100 s) kills the savings.
        let plan = plan_bank_travel(
            (24, 1),
            &tiles(),
            &[("recall_potion".into(), (0, 0))],
            &settings,
        )
        .unwrap();
        assert_eq!(plan.method, TravelMethod::Direct);
    }

    #[test]
    fn forest_potion_targets_forest_bank() {
        let plan = plan_bank_travel(
            (40, 40),
            &tiles(),
            &[("forest_bank_potion".into(), (7, 13))],
            &smart_settings(),
        )
        .unwrap();
        assert!(matches!(plan.method, TravelMethod::Potion { ref code, .. } if code == "forest_bank_potion"));
        assert_eq!(plan.bank, BankTile { x: 7, y: 13 });
    }
}
