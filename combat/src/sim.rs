//! The fight engine.
//!
//! Damage per element: `boosted = attack + round(attack * (element_bonus +
//! flat_bonus) / 100)`, reduced by `round(boosted * res / 100)`, floored at
//! zero. The per-turn hit is the elemental total scaled by the expected-crit
//! multiplier `1 + min(crit, 100)/100 * 0.5`, rounded to an integer.
//!
//! The loop caps at 100 turns; reaching the cap is a loss for the character.

use gameapi::Element;

use crate::stats::Combatant;

const MAX_TURNS: u32 = 100;
/// Winning with less than this fraction of hp left does not clear
/// [`can_beat_monster`].
const SAFE_HP_PCT: i32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FightPrediction {
    pub win: bool,
    pub turns: u32,
    /// Character hp when the fight ended, floored at zero.
    pub remaining_hp: i32,
}

fn round_frac(base: i64, pct: i64) -> i64 {
    ((base as f64) * (pct as f64) / 100.0).round() as i64
}

/// Expected hit from `attacker` against `defender`, before turn effects.
fn base_hit(attacker: &Combatant, defender: &Combatant) -> i32 {
    let mut total: i64 = 0;
    for element in Element::ALL {
        let attack = attacker.attack.get(element) as i64;
        let bonus = (attacker.dmg_bonus.get(element) + attacker.dmg) as i64;
        let boosted = attack + round_frac(attack, bonus);
        let reduction = round_frac(boosted, defender.res.get(element) as i64);
        total += (boosted - reduction).max(0);
    }

    let crit = attacker.critical_strike.clamp(0, 100) as f64;
    ((total as f64) * (1.0 + crit / 100.0 * 0.5)).round() as i32
}

/// Mutable per-side fight state.
struct Side<'a> {
    stats: &'a Combatant,
    hp: i32,
    shield: i32,
    poison: i32,
    burn: i32,
    attacks_made: u32,
    own_turns: u32,
    reconstitution_spent: bool,
}

impl<'a> Side<'a> {
    fn new(stats: &'a Combatant) -> Self {
        Self {
            stats,
            hp: stats.max_hp,
            shield: stats.protective_bubble(),
            poison: 0,
            burn: 0,
            attacks_made: 0,
            own_turns: 0,
            reconstitution_spent: false,
        }
    }

    fn heal(&mut self, amount: i32) {
        if amount <= 0 {
            return;
        }
        let corrupted = self.stats.corrupted().clamp(0, 100);
        let effective = amount - round_frac(amount as i64, corrupted as i64) as i32;
        self.hp = (self.hp + effective.max(0)).min(self.stats.max_hp);
    }

    /// Absorb through the bubble first, then hp.
    fn take(&mut self, damage: i32) {
        if damage <= 0 {
            return;
        }
        let absorbed = self.shield.min(damage);
        self.shield -= absorbed;
        self.hp -= damage - absorbed;
    }

    /// A killing blow may be cancelled once by reconstitution.
    fn check_down(&mut self) -> bool {
        if self.hp > 0 {
            return false;
        }
        if !self.reconstitution_spent {
            if let Some(pct) = self.stats.reconstitution() {
                self.reconstitution_spent = true;
                self.hp = (self.stats.max_hp as i64 * pct.clamp(1, 100) as i64 / 100) as i32;
                self.hp = self.hp.max(1);
                return false;
            }
        }
        true
    }
}

/// Deterministic turn-by-turn prediction. Side order: higher initiative acts
/// first, ties broken by higher max hp, then the character.
pub fn simulate_fight(character: &Combatant, monster: &Combatant) -> FightPrediction {
    let mut char_side = Side::new(character);
    let mut monster_side = Side::new(monster);

    let char_first = (character.initiative, character.max_hp) >= (monster.initiative, monster.max_hp);

    for turn in 1..=MAX_TURNS {
        let char_acts = char_first == (turn % 2 == 1);
        let (actor, defender) = if char_acts {
            (&mut char_side, &mut monster_side)
        } else {
            (&mut monster_side, &mut char_side)
        };

        actor.own_turns += 1;

        // Start-of-turn dots on the actor.
        let poison_tick = (actor.poison - actor.stats.antipoison()).max(0);
        actor.hp -= poison_tick;
        actor.hp -= actor.burn;
        actor.burn /= 2;
        if actor.check_down() {
            return finish(turn, &char_side, !char_acts);
        }

        if actor.own_turns % 3 == 0 {
            let restore = actor.stats.restore();
            actor.heal(restore);
        }

        // The hit.
        let mut hit = base_hit(actor.stats, defender.stats) as i64;
        if actor.hp * 2 < actor.stats.max_hp {
            hit += round_frac(hit, actor.stats.berserker_rage().max(0) as i64);
        }
        let ramp = actor.stats.frenzy() as i64 * actor.attacks_made as i64;
        hit += round_frac(hit, ramp);
        let hit = hit.max(0) as i32;

        let mitigated = hit - round_frac(hit as i64, defender.stats.barrier().clamp(0, 100) as i64) as i32;
        defender.take(mitigated);
        actor.attacks_made += 1;

        // On-hit riders.
        let drain = actor.stats.void_drain();
        if drain > 0 {
            defender.hp -= drain;
            actor.heal(drain);
        }
        actor.heal(round_frac(mitigated as i64, actor.stats.lifesteal().clamp(0, 100) as i64) as i32);
        if actor.stats.poison() > 0 {
            defender.poison = actor.stats.poison();
        }
        if actor.stats.burn() > 0 {
            defender.burn = round_frac(mitigated as i64, actor.stats.burn() as i64) as i32;
        }

        if defender.check_down() {
            return finish(turn, &char_side, char_acts);
        }

        // End-of-turn regeneration.
        let healing = actor.stats.healing();
        actor.heal(healing);
    }

    FightPrediction {
        win: false,
        turns: MAX_TURNS,
        remaining_hp: char_side.hp.max(0),
    }
}

fn finish(turn: u32, char_side: &Side<'_>, char_won: bool) -> FightPrediction {
    FightPrediction {
        win: char_won,
        turns: turn,
        remaining_hp: char_side.hp.max(0),
    }
}

/// Gate used by the routines: a predicted win that keeps a safety margin.
pub fn can_beat_monster(character: &Combatant, monster: &Combatant) -> bool {
    let prediction = simulate_fight(character, monster);
    prediction.win && prediction.remaining_hp * 100 >= character.max_hp * SAFE_HP_PCT
}

/// Healing required before engaging: hp lost in a simulated win, plus one.
/// `None` when the simulation predicts a loss.
pub fn hp_needed_for_fight(character: &Combatant, monster: &Combatant) -> Option<i32> {
    let prediction = simulate_fight(character, monster);
    prediction
        .win
        .then(|| (character.max_hp - prediction.remaining_hp) + 1)
}
