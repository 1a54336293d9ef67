use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub api: ApiSettings,
    pub http: HttpSettings,
    pub bank_travel: BankTravelSettings,
    pub order_board_path: String,
    pub gear_state_path: Option<String>,
    pub characters: Vec<CharacterSettings>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Bearer token; usually supplied via environment, kept here for
    /// single-file deployments.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.artifactsmmo.com".into(),
            token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSettings {
    pub listen_addr: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8787".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BankTravelMode {
    Direct,
    #[default]
    Smart,
}

/// Knobs for the bank travel planner: whether teleport potions may be used
/// and how their time cost is estimated against a direct walk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankTravelSettings {
    pub mode: BankTravelMode,
    pub allow_recall: bool,
    pub allow_forest_bank: bool,
    /// A potion route must beat the direct walk by at least this many
    /// seconds to be taken.
    pub min_savings_seconds: u64,
    pub include_return_to_origin: bool,
    pub move_seconds_per_tile: u64,
    pub item_use_seconds: u64,
}

impl Default for BankTravelSettings {
    fn default() -> Self {
        Self {
            mode: BankTravelMode::Smart,
            allow_recall: true,
            allow_forest_bank: true,
            min_savings_seconds: 10,
            include_return_to_origin: false,
            move_seconds_per_tile: 5,
            item_use_seconds: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterSettings {
    pub name: String,
    /// Snapshots older than this are re-fetched before scheduling.
    pub refresh_stale_secs: u64,
    pub rest: RestSettings,
    pub deposit: DepositSettings,
    pub expansion: ExpansionSettings,
    pub complete_task: CompleteTaskSettings,
    pub event: EventSettings,
    pub rotation: RotationSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestSettings {
    /// Rest kicks in at or below this hp percentage.
    pub trigger_pct: u32,
    /// Rest runs until at least this hp percentage.
    pub target_pct: u32,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            trigger_pct: 40,
            target_pct: 80,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepositSettings {
    /// Deposit triggers once carried items reach this fraction of capacity,
    /// in percent.
    pub threshold_pct: u32,
    /// Per-code quantities never deposited (potions, tools).
    pub keep_by_code: Vec<KeepEntry>,
    /// Also keep materials for the active task.
    #[serde(default = "default_true")]
    pub keep_task_materials: bool,
    /// Item codes sold on the grand exchange during the deposit trip.
    pub sell_codes: Vec<String>,
    /// Recycle equipment duplicates the roster already owns elsewhere.
    pub recycle_duplicates: bool,
    pub deposit_gold: bool,
    /// Carried gold kept out of the bank.
    pub gold_buffer: u64,
}

impl Default for DepositSettings {
    fn default() -> Self {
        Self {
            threshold_pct: 90,
            keep_by_code: Vec::new(),
            keep_task_materials: true,
            sell_codes: Vec::new(),
            recycle_duplicates: false,
            deposit_gold: true,
            gold_buffer: 1_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepEntry {
    pub code: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpansionSettings {
    pub enabled: bool,
    pub check_interval_ms: u64,
    /// Gold held back from the expansion budget.
    pub gold_buffer: u64,
    /// Spend at most this percentage of total gold on one expansion.
    pub max_gold_pct: u32,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_ms: 600_000,
            gold_buffer: 5_000,
            max_gold_pct: 50,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteTaskSettings {
    pub enabled: bool,
}

impl Default for CompleteTaskSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSettings {
    /// Event codes this character participates in. Empty disables the routine.
    pub events: Vec<String>,
    pub min_time_remaining_ms: u64,
    /// Highest monster tier the character will engage ("normal", "elite", "boss").
    pub max_monster_type: String,
    /// Simulated winrate (remaining-hp percentage) required to engage.
    pub min_winrate: u32,
    /// Minimum gap between two participations.
    pub cooldown_ms: u64,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            min_time_remaining_ms: 120_000,
            max_monster_type: "elite".into(),
            min_winrate: 40,
            cooldown_ms: 300_000,
        }
    }
}

/// Weighted mix of fallback activities. Weights are relative, not percentages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RotationSettings {
    pub combat: u32,
    pub gathering: u32,
    pub crafting: u32,
    pub task: u32,
    pub achievement: u32,
    pub orders: u32,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            combat: 3,
            gathering: 3,
            crafting: 2,
            task: 1,
            achievement: 1,
            orders: 4,
        }
    }
}
