//! Effect semantics, pinned turn by turn.
//!
//! The baseline duel (1000 hp / 50 fire / init 100 vs 500 hp / 30 fire /
//! init 50) wins on turn 19 with 730 hp; every case below perturbs exactly
//! one effect and asserts the full outcome, so any drift in an effect rule
//! shows up as a precise diff.

use combat::{Combatant, Effect, simulate_fight};
use gameapi::ElementStats;

fn fighter(hp: i32, fire_attack: i32, initiative: i32) -> Combatant {
    Combatant {
        max_hp: hp,
        attack: ElementStats {
            fire: fire_attack,
            ..Default::default()
        },
        initiative,
        ..Default::default()
    }
}

fn baseline_character() -> Combatant {
    fighter(1_000, 50, 100)
}

fn baseline_monster() -> Combatant {
    fighter(500, 30, 50)
}

#[test]
fn baseline_duel() {
    let p = simulate_fight(&baseline_character(), &baseline_monster());
    assert!(p.win);
    assert_eq!((p.turns, p.remaining_hp), (19, 730));
}

#[test]
fn protective_bubble_absorbs_before_hp() {
    let character = baseline_character().with_effects(vec![Effect::ProtectiveBubble(100)]);
    let p = simulate_fight(&character, &baseline_monster());
    assert_eq!((p.turns, p.remaining_hp), (19, 830));
}

#[test]
fn barrier_shaves_every_incoming_hit() {
    let character = baseline_character().with_effects(vec![Effect::Barrier(50)]);
    let p = simulate_fight(&character, &baseline_monster());
    assert_eq!((p.turns, p.remaining_hp), (19, 865));
}

#[test]
fn lifesteal_heals_on_each_hit_capped_at_max() {
    let character = baseline_character().with_effects(vec![Effect::Lifesteal(50)]);
    let p = simulate_fight(&character, &baseline_monster());
    assert_eq!((p.turns, p.remaining_hp), (19, 955));
}

#[test]
fn void_drain_shortens_the_fight_and_feeds_the_attacker() {
    let character = baseline_character().with_effects(vec![Effect::VoidDrain(10)]);
    let p = simulate_fight(&character, &baseline_monster());
    assert_eq!((p.turns, p.remaining_hp), (17, 840));
}

#[test]
fn poison_ticks_at_the_victims_turns() {
    let monster = baseline_monster().with_effects(vec![Effect::Poison(20)]);
    let p = simulate_fight(&baseline_character(), &monster);
    assert_eq!((p.turns, p.remaining_hp), (19, 550));
}

#[test]
fn antipoison_subtracts_from_each_tick() {
    let character = baseline_character().with_effects(vec![Effect::Antipoison(15)]);
    let monster = baseline_monster().with_effects(vec![Effect::Poison(20)]);
    let p = simulate_fight(&character, &monster);
    assert_eq!((p.turns, p.remaining_hp), (19, 685));
}

#[test]
fn burn_decays_by_half_per_tick() {
    let character = baseline_character().with_effects(vec![Effect::Burn(50)]);
    let p = simulate_fight(&character, &baseline_monster());
    assert_eq!((p.turns, p.remaining_hp), (13, 820));
}

#[test]
fn healing_regenerates_at_end_of_own_turn() {
    let monster = baseline_monster().with_effects(vec![Effect::Healing(10)]);
    let p = simulate_fight(&baseline_character(), &monster);
    assert!(p.win);
    assert_eq!((p.turns, p.remaining_hp), (25, 640));
}

#[test]
fn corrupted_negates_healing() {
    let monster = baseline_monster().with_effects(vec![Effect::Healing(10), Effect::Corrupted(100)]);
    let p = simulate_fight(&baseline_character(), &monster);
    // Fully corrupted healing leaves the baseline outcome untouched.
    assert_eq!((p.turns, p.remaining_hp), (19, 730));
}

#[test]
fn berserker_rage_doubles_damage_below_half_hp() {
    let character = fighter(1_000, 50, 100).with_effects(vec![Effect::BerserkerRage(100)]);
    let monster = fighter(1_500, 30, 50);

    let without = simulate_fight(&fighter(1_000, 50, 100), &monster);
    assert_eq!((without.turns, without.remaining_hp), (59, 130));

    let with = simulate_fight(&character, &monster);
    assert_eq!((with.turns, with.remaining_hp), (47, 310));
}

#[test]
fn frenzy_ramps_per_prior_attack() {
    let character = baseline_character().with_effects(vec![Effect::Frenzy(10)]);
    let p = simulate_fight(&character, &baseline_monster());
    assert_eq!((p.turns, p.remaining_hp), (15, 790));
}

#[test]
fn restore_heals_every_third_own_turn() {
    let character = baseline_character().with_effects(vec![Effect::Restore(90)]);
    let p = simulate_fight(&character, &baseline_monster());
    assert_eq!((p.turns, p.remaining_hp), (19, 970));
}

#[test]
fn reconstitution_survives_one_killing_blow() {
    let monster = baseline_monster().with_effects(vec![Effect::Reconstitution(50)]);
    let p = simulate_fight(&baseline_character(), &monster);
    assert!(p.win);
    assert_eq!((p.turns, p.remaining_hp), (29, 580));
}

#[test]
fn unknown_effect_codes_are_ignored() {
    assert_eq!(Effect::from_spec("fishing_luck", 30), None);
    assert_eq!(Effect::from_spec("burn", 30), Some(Effect::Burn(30)));
}
