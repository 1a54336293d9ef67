//! Property: the simulator is a pure function of its inputs.

use combat::{Combatant, simulate_fight};
use gameapi::ElementStats;
use proptest::prelude::*;

fn arb_combatant() -> impl Strategy<Value = Combatant> {
    (
        1i32..5_000,
        0i32..300,
        0i32..300,
        -50i32..80,
        0i32..150,
        0i32..200,
    )
        .prop_map(|(hp, fire, water, res, crit, initiative)| Combatant {
            max_hp: hp,
            attack: ElementStats {
                fire,
                water,
                ..Default::default()
            },
            res: ElementStats {
                fire: res,
                water: res,
                ..Default::default()
            },
            critical_strike: crit,
            initiative,
            ..Default::default()
        })
}

proptest! {
    #[test]
    fn identical_inputs_identical_outputs(
        character in arb_combatant(),
        monster in arb_combatant(),
    ) {
        let a = simulate_fight(&character, &monster);
        let b = simulate_fight(&character, &monster);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn turns_bounded_and_hp_sane(
        character in arb_combatant(),
        monster in arb_combatant(),
    ) {
        let p = simulate_fight(&character, &monster);
        prop_assert!(p.turns >= 1 && p.turns <= 100);
        prop_assert!(p.remaining_hp >= 0);
        prop_assert!(p.remaining_hp <= character.max_hp);
    }
}
