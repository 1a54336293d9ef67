//! Static game data (monsters, resources, items, locations).
//!
//! Loading this data is a collaborator concern; the agent consumes it through
//! the [`StaticData`] trait so routines and the travel planner can resolve
//! codes to stats and coordinates without touching the loader.

use serde::{Deserialize, Serialize};

use crate::types::{CharacterData, ElementStats, SimpleItem, Skill};

/// A named effect with a magnitude, as carried by monsters and equipment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSpec {
    pub code: String,
    pub value: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonsterData {
    pub code: String,
    pub level: u32,
    /// "normal", "elite" or "boss".
    pub monster_type: String,
    pub hp: i32,
    pub attack: ElementStats,
    pub res: ElementStats,
    pub critical_strike: i32,
    pub initiative: i32,
    pub effects: Vec<EffectSpec>,
    /// Monsters only spawned by world events have no fixed map location.
    pub event_only: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceData {
    pub code: String,
    pub skill: Option<Skill>,
    pub level: u32,
    pub drops: Vec<SimpleItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recipe {
    pub skill: Option<Skill>,
    pub level: u32,
    pub items: Vec<SimpleItem>,
    pub quantity: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UseCondition {
    pub code: String,
    pub operator: String,
    pub value: i32,
}

impl UseCondition {
    /// Evaluate against a character. Unknown condition codes fail closed.
    pub fn is_met(&self, character: &CharacterData) -> bool {
        let actual = match self.code.as_str() {
            "level" => character.skills.combat as i32,
            "mining_level" => character.skills.mining as i32,
            "woodcutting_level" => character.skills.woodcutting as i32,
            "fishing_level" => character.skills.fishing as i32,
            "alchemy_level" => character.skills.alchemy as i32,
            _ => return false,
        };
        match self.operator.as_str() {
            "eq" => actual == self.value,
            "ne" => actual != self.value,
            "gt" => actual > self.value,
            "lt" => actual < self.value,
            _ => actual >= self.value,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemData {
    pub code: String,
    pub level: u32,
    #[serde(rename = "type")]
    pub item_type: String,
    pub subtype: String,
    pub craft: Option<Recipe>,
    pub conditions: Vec<UseCondition>,
    pub effects: Vec<EffectSpec>,
}

impl ItemData {
    pub fn conditions_met(&self, character: &CharacterData) -> bool {
        self.conditions.iter().all(|c| c.is_met(character))
    }

    pub fn is_equipment(&self) -> bool {
        matches!(
            self.item_type.as_str(),
            "weapon" | "helmet" | "body_armor" | "leg_armor" | "boots" | "shield" | "ring" | "amulet"
        )
    }
}

/// Read-only index over the static game data set.
pub trait StaticData: Send + Sync {
    fn monster(&self, code: &str) -> Option<MonsterData>;
    fn resource(&self, code: &str) -> Option<ResourceData>;
    fn item(&self, code: &str) -> Option<ItemData>;
    fn monsters(&self) -> Vec<MonsterData>;
    fn resources(&self) -> Vec<ResourceData>;
    fn items(&self) -> Vec<ItemData>;
    /// Fixed map coordinates hosting the given content, if any.
    fn locations_of(&self, content_type: &str, code: &str) -> Vec<(i32, i32)>;
}

/// In-memory [`StaticData`] built from plain vectors. The production loader
/// populates one of these at startup; tests construct them directly.
#[derive(Default)]
pub struct StaticIndex {
    monsters: Vec<MonsterData>,
    resources: Vec<ResourceData>,
    items: Vec<ItemData>,
    locations: Vec<(String, String, i32, i32)>,
}

impl StaticIndex {
    pub fn new(
        monsters: Vec<MonsterData>,
        resources: Vec<ResourceData>,
        items: Vec<ItemData>,
    ) -> Self {
        Self {
            monsters,
            resources,
            items,
            locations: Vec::new(),
        }
    }

    pub fn add_location(&mut self, content_type: &str, code: &str, x: i32, y: i32) {
        self.locations
            .push((content_type.to_string(), code.to_string(), x, y));
    }
}

impl StaticData for StaticIndex {
    fn monster(&self, code: &str) -> Option<MonsterData> {
        self.monsters.iter().find(|m| m.code == code).cloned()
    }

    fn resource(&self, code: &str) -> Option<ResourceData> {
        self.resources.iter().find(|r| r.code == code).cloned()
    }

    fn item(&self, code: &str) -> Option<ItemData> {
        self.items.iter().find(|i| i.code == code).cloned()
    }

    fn monsters(&self) -> Vec<MonsterData> {
        self.monsters.clone()
    }

    fn resources(&self) -> Vec<ResourceData> {
        self.resources.clone()
    }

    fn items(&self) -> Vec<ItemData> {
        self.items.clone()
    }

    fn locations_of(&self, content_type: &str, code: &str) -> Vec<(i32, i32)> {
        self.locations
            .iter()
            .filter(|(t, c, _, _)| t == content_type && c == code)
            .map(|(_, _, x, y)| (*x, *y))
            .collect()
    }
}
