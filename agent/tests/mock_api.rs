//! In-memory game server used by the agent integration tests.
//!
//! Tracks characters, bank stock and a call log so tests can assert on the
//! exact sequence of API calls an operation produced.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use agent::Services;
use agent::bank::BankTileCache;
use common::{Clock, ManualClock};
use gameapi::{
    AchievementData, ActionResult, ActiveEvent, ApiError, BankDetails, CharacterData, Cooldown,
    GameApi, InventorySlot, MapContent, MapFilter, MapTile, Page, ServerDetails, SimpleItem,
    StaticIndex,
};
use ledger::InventoryLedger;
use orders::{MemoryStore, OrderBoard};
use settings::CharacterSettings;
use status::StatusBus;

pub struct MockState {
    pub characters: HashMap<String, CharacterData>,
    pub bank: BTreeMap<String, u32>,
    pub bank_gold: u64,
}

pub struct MockGameApi {
    pub state: Mutex<MockState>,
    pub calls: Mutex<Vec<String>>,
    pub bank_fetches: AtomicUsize,
    /// Withdraws of this code always fail with a position fault.
    pub fail_location_code: Mutex<Option<String>>,
}

impl MockGameApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                characters: HashMap::new(),
                bank: BTreeMap::new(),
                bank_gold: 0,
            }),
            calls: Mutex::new(Vec::new()),
            bank_fetches: AtomicUsize::new(0),
            fail_location_code: Mutex::new(None),
        }
    }

    pub fn add_character(&self, character: CharacterData) {
        self.state
            .lock()
            .characters
            .insert(character.name.clone(), character);
    }

    pub fn set_bank(&self, items: &[(&str, u32)]) {
        let mut state = self.state.lock();
        state.bank = items
            .iter()
            .map(|(code, qty)| ((*code).to_string(), *qty))
            .collect();
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn bank_fetch_count(&self) -> usize {
        self.bank_fetches.load(Ordering::SeqCst)
    }

    fn log(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn character_result(&self, name: &str) -> ActionResult {
        let state = self.state.lock();
        ActionResult {
            cooldown: Cooldown::default(),
            character: state.characters.get(name).cloned(),
            fight: None,
            bank: None,
        }
    }
}

fn add_to_inventory(character: &mut CharacterData, code: &str, quantity: u32) {
    if let Some(slot) = character.inventory.iter_mut().find(|s| s.code == code) {
        slot.quantity += quantity;
        return;
    }
    if let Some(slot) = character
        .inventory
        .iter_mut()
        .find(|s| s.code.is_empty() || s.quantity == 0)
    {
        slot.code = code.to_string();
        slot.quantity = quantity;
    }
}

fn remove_from_inventory(character: &mut CharacterData, code: &str, quantity: u32) {
    if let Some(slot) = character.inventory.iter_mut().find(|s| s.code == code) {
        slot.quantity = slot.quantity.saturating_sub(quantity);
        if slot.quantity == 0 {
            slot.code.clear();
        }
    }
}

#[async_trait::async_trait]
impl GameApi for MockGameApi {
    async fn get_my_characters(&self) -> Result<Vec<CharacterData>, ApiError> {
        Ok(self.state.lock().characters.values().cloned().collect())
    }

    async fn get_character(&self, name: &str) -> Result<CharacterData, ApiError> {
        self.state
            .lock()
            .characters
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("character {name}")))
    }

    async fn get_maps(&self, filter: MapFilter) -> Result<Page<MapTile>, ApiError> {
        let items = if filter.content_type.as_deref() == Some("bank") {
            vec![MapTile {
                x: 4,
                y: 1,
                content: Some(MapContent {
                    kind: "bank".into(),
                    code: "bank".into(),
                }),
                conditions: vec![],
            }]
        } else {
            vec![]
        };
        Ok(Page {
            items,
            page: 1,
            pages: 1,
        })
    }

    async fn get_bank_details(&self) -> Result<BankDetails, ApiError> {
        let state = self.state.lock();
        Ok(BankDetails {
            gold: state.bank_gold,
            slots: 50,
            used_slots: state.bank.len() as u32,
            next_expansion_cost: 10_000,
        })
    }

    async fn get_bank_items(&self, _page: u32) -> Result<Page<SimpleItem>, ApiError> {
        self.bank_fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        Ok(Page {
            items: state
                .bank
                .iter()
                .map(|(code, qty)| SimpleItem::new(code.clone(), *qty))
                .collect(),
            page: 1,
            pages: 1,
        })
    }

    async fn get_active_events(&self) -> Result<Vec<ActiveEvent>, ApiError> {
        Ok(vec![])
    }

    async fn get_server_details(&self) -> Result<ServerDetails, ApiError> {
        Ok(ServerDetails {
            version: "test".into(),
            is_sandbox: true,
        })
    }

    async fn get_achievements(&self, page: u32, _size: u32) -> Result<Page<AchievementData>, ApiError> {
        Ok(Page {
            items: vec![],
            page,
            pages: 1,
        })
    }

    async fn move_to(&self, name: &str, x: i32, y: i32) -> Result<ActionResult, ApiError> {
        self.log(format!("move {name} {x},{y}"));
        {
            let mut state = self.state.lock();
            let character = state
                .characters
                .get_mut(name)
                .ok_or_else(|| ApiError::NotFound(name.into()))?;
            character.x = x;
            character.y = y;
        }
        Ok(self.character_result(name))
    }

    async fn fight(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.log(format!("fight {name}"));
        Ok(self.character_result(name))
    }

    async fn gather(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.log(format!("gather {name}"));
        Ok(self.character_result(name))
    }

    async fn craft(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError> {
        self.log(format!("craft {name} {code}:{quantity}"));
        Ok(self.character_result(name))
    }

    async fn rest(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.log(format!("rest {name}"));
        {
            let mut state = self.state.lock();
            if let Some(character) = state.characters.get_mut(name) {
                character.hp = (character.hp + 50).min(character.max_hp);
            }
        }
        Ok(self.character_result(name))
    }

    async fn use_item(&self, name: &str, code: &str, _quantity: u32) -> Result<ActionResult, ApiError> {
        self.log(format!("use {name} {code}"));
        Ok(self.character_result(name))
    }

    async fn recycle(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError> {
        self.log(format!("recycle {name} {code}:{quantity}"));
        Ok(self.character_result(name))
    }

    async fn equip(&self, name: &str, code: &str, slot: &str) -> Result<ActionResult, ApiError> {
        self.log(format!("equip {name} {code} {slot}"));
        Ok(self.character_result(name))
    }

    async fn unequip(&self, name: &str, slot: &str) -> Result<ActionResult, ApiError> {
        self.log(format!("unequip {name} {slot}"));
        Ok(self.character_result(name))
    }

    async fn sell(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError> {
        self.log(format!("sell {name} {code}:{quantity}"));
        Ok(self.character_result(name))
    }

    async fn deposit_bank(&self, name: &str, items: &[SimpleItem]) -> Result<ActionResult, ApiError> {
        for item in items {
            self.log(format!("deposit {name} {}:{}", item.code, item.quantity));
            let mut state = self.state.lock();
            *state.bank.entry(item.code.clone()).or_insert(0) += item.quantity;
            if let Some(character) = state.characters.get_mut(name) {
                remove_from_inventory(character, &item.code, item.quantity);
            }
        }
        Ok(self.character_result(name))
    }

    async fn withdraw_bank(&self, name: &str, items: &[SimpleItem]) -> Result<ActionResult, ApiError> {
        for item in items {
            if self.fail_location_code.lock().as_deref() == Some(item.code.as_str()) {
                return Err(ApiError::BankLocation);
            }
            self.log(format!("withdraw {name} {}:{}", item.code, item.quantity));

            let mut state = self.state.lock();
            let held = state.bank.get(&item.code).copied().unwrap_or(0);
            if held < item.quantity {
                return Err(ApiError::BankAvailability(format!(
                    "Not enough {} in bank",
                    item.code
                )));
            }
            *state.bank.get_mut(&item.code).unwrap() -= item.quantity;
            if let Some(character) = state.characters.get_mut(name) {
                add_to_inventory(character, &item.code, item.quantity);
            }
        }
        Ok(self.character_result(name))
    }

    async fn deposit_gold(&self, name: &str, quantity: u64) -> Result<ActionResult, ApiError> {
        self.log(format!("deposit_gold {name} {quantity}"));
        {
            let mut state = self.state.lock();
            state.bank_gold += quantity;
            if let Some(character) = state.characters.get_mut(name) {
                character.gold = character.gold.saturating_sub(quantity);
            }
        }
        Ok(self.character_result(name))
    }

    async fn withdraw_gold(&self, name: &str, quantity: u64) -> Result<ActionResult, ApiError> {
        self.log(format!("withdraw_gold {name} {quantity}"));
        {
            let mut state = self.state.lock();
            state.bank_gold = state.bank_gold.saturating_sub(quantity);
            if let Some(character) = state.characters.get_mut(name) {
                character.gold += quantity;
            }
        }
        Ok(self.character_result(name))
    }

    async fn buy_bank_expansion(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.log(format!("buy_expansion {name}"));
        Ok(self.character_result(name))
    }

    async fn complete_task(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.log(format!("complete_task {name}"));
        Ok(self.character_result(name))
    }

    async fn accept_task(&self, name: &str) -> Result<ActionResult, ApiError> {
        self.log(format!("accept_task {name}"));
        Ok(self.character_result(name))
    }
}

/// A character with `slots` empty inventory slots at the given position.
pub fn mk_character(name: &str, x: i32, y: i32, slots: u32) -> CharacterData {
    CharacterData {
        name: name.into(),
        x,
        y,
        hp: 100,
        max_hp: 100,
        inventory: (0..slots)
            .map(|i| InventorySlot {
                slot: i,
                code: String::new(),
                quantity: 0,
            })
            .collect(),
        inventory_max_items: 100,
        ..Default::default()
    }
}

/// Wire up a full service bundle around the mock, with the bank cache primed.
pub async fn test_services(api: Arc<MockGameApi>, clock: Arc<ManualClock>) -> Services {
    let clock: Arc<dyn Clock> = clock;
    let ledger = Arc::new(InventoryLedger::new(api.clone(), clock.clone()));
    ledger.get_bank_items(false).await;

    let orders = Arc::new(
        OrderBoard::initialize(Arc::new(MemoryStore::default()), clock.clone())
            .await
            .expect("memory board"),
    );

    Services {
        api: api.clone(),
        ledger,
        orders,
        data: Arc::new(StaticIndex::default()),
        clock: clock.clone(),
        tiles: Arc::new(BankTileCache::new(api, clock.clone())),
        status: Arc::new(StatusBus::new(clock)),
        travel: settings::BankTravelSettings::default(),
    }
}

pub fn worker_settings() -> CharacterSettings {
    CharacterSettings {
        name: "Worker".into(),
        refresh_stale_secs: 30,
        ..Default::default()
    }
}
