//! Domain types shared by every consumer of the game API.
//!
//! Stats are fixed records indexed by [`Element::ALL`]; the wire format's
//! per-element fields are normalized into [`ElementStats`] at the
//! deserialization boundary so the rest of the agent never touches raw maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    Fire,
    Earth,
    Water,
    Air,
}

impl Element {
    pub const ALL: [Element; 4] = [Element::Fire, Element::Earth, Element::Water, Element::Air];

    pub fn as_str(&self) -> &'static str {
        match self {
            Element::Fire => "fire",
            Element::Earth => "earth",
            Element::Water => "water",
            Element::Air => "air",
        }
    }
}

/// One value per element. Zero-filled by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementStats {
    #[serde(default)]
    pub fire: i32,
    #[serde(default)]
    pub earth: i32,
    #[serde(default)]
    pub water: i32,
    #[serde(default)]
    pub air: i32,
}

impl ElementStats {
    pub fn get(&self, element: Element) -> i32 {
        match element {
            Element::Fire => self.fire,
            Element::Earth => self.earth,
            Element::Water => self.water,
            Element::Air => self.air,
        }
    }

    pub fn set(&mut self, element: Element, value: i32) {
        match element {
            Element::Fire => self.fire = value,
            Element::Earth => self.earth = value,
            Element::Water => self.water = value,
            Element::Air => self.air = value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Combat,
    Mining,
    Woodcutting,
    Fishing,
    Weaponcrafting,
    Gearcrafting,
    Jewelrycrafting,
    Cooking,
    Alchemy,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Combat => "combat",
            Skill::Mining => "mining",
            Skill::Woodcutting => "woodcutting",
            Skill::Fishing => "fishing",
            Skill::Weaponcrafting => "weaponcrafting",
            Skill::Gearcrafting => "gearcrafting",
            Skill::Jewelrycrafting => "jewelrycrafting",
            Skill::Cooking => "cooking",
            Skill::Alchemy => "alchemy",
        }
    }
}

impl std::str::FromStr for Skill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combat" => Ok(Skill::Combat),
            "mining" => Ok(Skill::Mining),
            "woodcutting" => Ok(Skill::Woodcutting),
            "fishing" => Ok(Skill::Fishing),
            "weaponcrafting" => Ok(Skill::Weaponcrafting),
            "gearcrafting" => Ok(Skill::Gearcrafting),
            "jewelrycrafting" => Ok(Skill::Jewelrycrafting),
            "cooking" => Ok(Skill::Cooking),
            "alchemy" => Ok(Skill::Alchemy),
            other => Err(format!("unknown skill '{other}'")),
        }
    }
}

/// Per-skill levels. The combat level doubles as the character level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillLevels {
    pub combat: u32,
    pub mining: u32,
    pub woodcutting: u32,
    pub fishing: u32,
    pub weaponcrafting: u32,
    pub gearcrafting: u32,
    pub jewelrycrafting: u32,
    pub cooking: u32,
    pub alchemy: u32,
}

impl SkillLevels {
    pub fn get(&self, skill: Skill) -> u32 {
        match skill {
            Skill::Combat => self.combat,
            Skill::Mining => self.mining,
            Skill::Woodcutting => self.woodcutting,
            Skill::Fishing => self.fishing,
            Skill::Weaponcrafting => self.weaponcrafting,
            Skill::Gearcrafting => self.gearcrafting,
            Skill::Jewelrycrafting => self.jewelrycrafting,
            Skill::Cooking => self.cooking,
            Skill::Alchemy => self.alchemy,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySlot {
    pub slot: u32,
    pub code: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub code: String,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskInfo {
    pub code: String,
    /// "monsters" or "items".
    pub kind: String,
    pub progress: u32,
    pub total: u32,
}

impl Default for TaskInfo {
    fn default() -> Self {
        Self {
            code: String::new(),
            kind: "monsters".into(),
            progress: 0,
            total: 0,
        }
    }
}

/// Live server-side state of one character.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterData {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub xp: u64,
    pub max_xp: u64,
    pub gold: u64,
    pub critical_strike: i32,
    pub initiative: i32,
    pub attack: ElementStats,
    /// Flat damage bonus applied to every element.
    pub dmg: i32,
    /// Per-element damage bonus, percent.
    pub dmg_bonus: ElementStats,
    pub res: ElementStats,
    pub skills: SkillLevels,
    pub task: Option<TaskInfo>,
    pub inventory: Vec<InventorySlot>,
    pub inventory_max_items: u32,
    pub equipment: BTreeMap<String, EquippedItem>,
}

impl CharacterData {
    pub fn is_at(&self, x: i32, y: i32) -> bool {
        self.x == x && self.y == y
    }

    pub fn hp_pct(&self) -> u32 {
        if self.max_hp <= 0 {
            return 0;
        }
        ((self.hp.max(0) as u64 * 100) / self.max_hp as u64) as u32
    }

    /// Total carried item quantity across all slots.
    pub fn inventory_count(&self) -> u32 {
        self.inventory.iter().map(|s| s.quantity).sum()
    }

    pub fn inventory_capacity(&self) -> u32 {
        self.inventory_max_items
    }

    pub fn inventory_free_slots(&self) -> usize {
        self.inventory
            .iter()
            .filter(|s| s.code.is_empty() || s.quantity == 0)
            .count()
    }

    pub fn item_count(&self, code: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|s| s.code == code)
            .map(|s| s.quantity)
            .sum()
    }

    pub fn has_item(&self, code: &str, quantity: u32) -> bool {
        self.item_count(code) >= quantity
    }

    pub fn skill_level(&self, skill: Skill) -> u32 {
        self.skills.get(skill)
    }

    pub fn task_complete(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|t| t.total > 0 && t.progress >= t.total)
    }
}

/// Post-action wait returned by every game action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cooldown {
    pub total_seconds: f64,
    pub remaining_seconds: f64,
    pub action: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleItem {
    pub code: String,
    pub quantity: u32,
}

impl SimpleItem {
    pub fn new(code: impl Into<String>, quantity: u32) -> Self {
        Self {
            code: code.into(),
            quantity,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
}

/// One access condition on a map tile. Tiles with a non-empty condition list
/// are treated as inaccessible by the bank discovery pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessCondition {
    pub code: String,
    pub operator: String,
    pub value: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapTile {
    pub x: i32,
    pub y: i32,
    pub content: Option<MapContent>,
    pub conditions: Vec<AccessCondition>,
}

impl MapTile {
    pub fn is_unconditional(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Bank-wide summary (gold and slot accounting, not items).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankDetails {
    pub gold: u64,
    pub slots: u32,
    pub used_slots: u32,
    pub next_expansion_cost: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FightOutcome {
    /// "win" or "loss", as reported by the server.
    pub result: String,
    pub turns: u32,
    pub xp: u64,
    pub gold: u64,
    pub drops: Vec<SimpleItem>,
}

impl FightOutcome {
    pub fn won(&self) -> bool {
        self.result == "win"
    }
}

/// Normalized action response: every action carries a cooldown, most carry
/// the updated character, some carry action-specific payloads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResult {
    pub cooldown: Cooldown,
    pub character: Option<CharacterData>,
    pub fight: Option<FightOutcome>,
    pub bank: Option<BankDetails>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveEvent {
    pub code: String,
    pub x: i32,
    pub y: i32,
    pub monster_code: Option<String>,
    /// "normal", "elite" or "boss" when the event hosts a monster.
    pub monster_type: Option<String>,
    pub ends_at_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementData {
    pub code: String,
    pub skill: Option<String>,
    pub total: u64,
    pub progress: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerDetails {
    pub version: String,
    pub is_sandbox: bool,
}

/// One page of a paginated listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.page < self.pages
    }
}

/// Filter for the maps listing endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapFilter {
    pub content_type: Option<String>,
    pub content_code: Option<String>,
    pub page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_with_inventory(slots: &[(&str, u32)]) -> CharacterData {
        CharacterData {
            inventory: slots
                .iter()
                .enumerate()
                .map(|(i, (code, qty))| InventorySlot {
                    slot: i as u32,
                    code: (*code).into(),
                    quantity: *qty,
                })
                .collect(),
            inventory_max_items: 100,
            ..Default::default()
        }
    }

    #[test]
    fn inventory_counts() {
        let c = char_with_inventory(&[("copper_ore", 30), ("", 0), ("ash_wood", 12)]);
        assert_eq!(c.inventory_count(), 42);
        assert_eq!(c.item_count("copper_ore"), 30);
        assert_eq!(c.inventory_free_slots(), 1);
        assert!(c.has_item("ash_wood", 12));
        assert!(!c.has_item("ash_wood", 13));
    }

    #[test]
    fn hp_pct_handles_zero_max() {
        let mut c = CharacterData::default();
        assert_eq!(c.hp_pct(), 0);
        c.max_hp = 200;
        c.hp = 50;
        assert_eq!(c.hp_pct(), 25);
    }

    #[test]
    fn element_stats_round_trip() {
        let mut s = ElementStats::default();
        for (i, el) in Element::ALL.iter().enumerate() {
            s.set(*el, i as i32 + 1);
        }
        assert_eq!(s.get(Element::Fire), 1);
        assert_eq!(s.get(Element::Air), 4);
    }

    #[test]
    fn task_completion() {
        let mut c = CharacterData::default();
        assert!(!c.task_complete());
        c.task = Some(TaskInfo {
            code: "chicken".into(),
            kind: "monsters".into(),
            progress: 10,
            total: 10,
        });
        assert!(c.task_complete());
    }
}
