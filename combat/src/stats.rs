use serde::{Deserialize, Serialize};

use gameapi::{CharacterData, ElementStats, MonsterData};

/// Turn-boundary effect carried by a combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "code", content = "value")]
pub enum Effect {
    /// Reduce every incoming hit by this percentage.
    Barrier(i32),
    /// Once per fight, survive a killing blow at this percentage of max hp.
    Reconstitution(i32),
    /// Heal this amount at the end of each own turn.
    Healing(i32),
    /// Landed hits refresh a poison of this tick damage on the victim.
    Poison(i32),
    /// Subtract this amount from every poison tick taken.
    Antipoison(i32),
    /// Landed hits set a burn of this percentage of the hit, halving per tick.
    Burn(i32),
    /// All healing received is reduced by this percentage.
    Corrupted(i32),
    /// Outgoing damage bonus while below half hp.
    BerserkerRage(i32),
    /// Each landed hit drains this flat amount of hp from the victim.
    VoidDrain(i32),
    /// Absorb this much damage before hp is touched.
    ProtectiveBubble(i32),
    /// Heal this percentage of every dealt hit.
    Lifesteal(i32),
    /// Outgoing damage grows by this percentage per prior own attack.
    Frenzy(i32),
    /// Heal this amount at the start of every third own turn.
    Restore(i32),
}

impl Effect {
    /// Map a wire-format effect to a simulation rule. Unknown codes are
    /// ignored by the simulator (cosmetic or out-of-combat effects).
    pub fn from_spec(code: &str, value: i32) -> Option<Effect> {
        let effect = match code {
            "barrier" => Effect::Barrier(value),
            "reconstitution" => Effect::Reconstitution(value),
            "healing" => Effect::Healing(value),
            "poison" => Effect::Poison(value),
            "antipoison" => Effect::Antipoison(value),
            "burn" => Effect::Burn(value),
            "corrupted" => Effect::Corrupted(value),
            "berserker_rage" => Effect::BerserkerRage(value),
            "void_drain" => Effect::VoidDrain(value),
            "protective_bubble" => Effect::ProtectiveBubble(value),
            "lifesteal" => Effect::Lifesteal(value),
            "frenzy" => Effect::Frenzy(value),
            "restore" => Effect::Restore(value),
            _ => return None,
        };
        Some(effect)
    }
}

/// Stat snapshot of one side of a fight. Fights always simulate from full hp.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Combatant {
    pub max_hp: i32,
    pub attack: ElementStats,
    /// Flat damage bonus applied to every element, percent.
    pub dmg: i32,
    /// Per-element damage bonus, percent.
    pub dmg_bonus: ElementStats,
    pub res: ElementStats,
    pub critical_strike: i32,
    pub initiative: i32,
    pub effects: Vec<Effect>,
}

impl Combatant {
    pub fn with_effects(mut self, effects: Vec<Effect>) -> Self {
        self.effects = effects;
        self
    }

    fn effect_value(&self, pick: impl Fn(&Effect) -> Option<i32>) -> i32 {
        self.effects.iter().filter_map(pick).sum()
    }

    pub(crate) fn barrier(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Barrier(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn lifesteal(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Lifesteal(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn void_drain(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::VoidDrain(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn poison(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Poison(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn antipoison(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Antipoison(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn burn(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Burn(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn healing(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Healing(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn restore(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Restore(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn corrupted(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Corrupted(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn berserker_rage(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::BerserkerRage(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn frenzy(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::Frenzy(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn protective_bubble(&self) -> i32 {
        self.effect_value(|e| match e {
            Effect::ProtectiveBubble(v) => Some(*v),
            _ => None,
        })
    }

    pub(crate) fn reconstitution(&self) -> Option<i32> {
        self.effects.iter().find_map(|e| match e {
            Effect::Reconstitution(v) => Some(*v),
            _ => None,
        })
    }
}

impl From<&CharacterData> for Combatant {
    fn from(c: &CharacterData) -> Self {
        Combatant {
            max_hp: c.max_hp,
            attack: c.attack,
            dmg: c.dmg,
            dmg_bonus: c.dmg_bonus,
            res: c.res,
            critical_strike: c.critical_strike,
            initiative: c.initiative,
            effects: Vec::new(),
        }
    }
}

impl From<&MonsterData> for Combatant {
    fn from(m: &MonsterData) -> Self {
        Combatant {
            max_hp: m.hp,
            attack: m.attack,
            dmg: 0,
            dmg_bonus: ElementStats::default(),
            res: m.res,
            critical_strike: m.critical_strike,
            initiative: m.initiative,
            effects: m
                .effects
                .iter()
                .filter_map(|e| Effect::from_spec(&e.code, e.value))
                .collect(),
        }
    }
}
