//! Per-character façade over live server state.
//!
//! One context per character, owned by its worker task. All game actions go
//! through the helpers here so the returned cooldown and character snapshot
//! are applied uniformly, the ledger learns about carried items, and every
//! change reaches the status bus.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use common::Clock;
use gameapi::{
    ActionResult, ApiError, BankDetails, CharacterData, FightOutcome, GameApi, SimpleItem, Skill,
    StaticData,
};
use ledger::InventoryLedger;
use orders::OrderBoard;
use settings::{BankTravelSettings, CharacterSettings};
use status::{CharacterStatus, CharacterView, StatusBus};

use crate::bank::tiles::BankTileCache;

/// Shared service handles injected into every context.
#[derive(Clone)]
pub struct Services {
    pub api: Arc<dyn GameApi>,
    pub ledger: Arc<InventoryLedger>,
    pub orders: Arc<OrderBoard>,
    pub data: Arc<dyn StaticData>,
    pub clock: Arc<dyn Clock>,
    pub tiles: Arc<BankTileCache>,
    pub status: Arc<StatusBus>,
    pub travel: BankTravelSettings,
}

pub struct CharacterContext {
    name: String,
    settings: CharacterSettings,
    services: Services,
    live: CharacterData,
    cooldown_until_ms: u64,
    last_refresh_ms: u64,
    stale: bool,
    status: CharacterStatus,
    last_action: String,
    // Routine bookkeeping.
    pub(crate) last_event_run_ms: u64,
    pub(crate) last_expansion_check_ms: u64,
    pub(crate) rotation_tick: u64,
}

impl CharacterContext {
    pub fn new(settings: CharacterSettings, services: Services, live: CharacterData) -> Self {
        let now = services.clock.now_ms();
        let mut ctx = Self {
            name: settings.name.clone(),
            settings,
            services,
            live,
            cooldown_until_ms: 0,
            last_refresh_ms: now,
            stale: false,
            status: CharacterStatus::Starting,
            last_action: "starting".into(),
            last_event_run_ms: 0,
            last_expansion_check_ms: 0,
            rotation_tick: 0,
        };
        ctx.push_carried();
        ctx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn live(&self) -> &CharacterData {
        &self.live
    }

    pub fn settings(&self) -> &CharacterSettings {
        &self.settings
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn cooldown_until_ms(&self) -> u64 {
        self.cooldown_until_ms
    }

    // --- convenience reads over the live snapshot ---

    pub fn is_at(&self, x: i32, y: i32) -> bool {
        self.live.is_at(x, y)
    }

    pub fn has_item(&self, code: &str, quantity: u32) -> bool {
        self.live.has_item(code, quantity)
    }

    pub fn item_count(&self, code: &str) -> u32 {
        self.live.item_count(code)
    }

    pub fn inventory_count(&self) -> u32 {
        self.live.inventory_count()
    }

    pub fn inventory_capacity(&self) -> u32 {
        self.live.inventory_capacity()
    }

    pub fn inventory_free_slots(&self) -> usize {
        self.live.inventory_free_slots()
    }

    pub fn skill_level(&self, skill: Skill) -> u32 {
        self.live.skill_level(skill)
    }

    // --- lifecycle ---

    /// Block until this character's cooldown has elapsed.
    pub async fn wait_for_cooldown(&self) {
        self.services
            .clock
            .sleep_until_ms(self.cooldown_until_ms)
            .await;
    }

    /// Re-fetch the live snapshot from the server.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let live = self.services.api.get_character(&self.name).await?;
        self.live = live;
        self.last_refresh_ms = self.services.clock.now_ms();
        self.stale = false;
        self.push_carried();
        self.publish();
        Ok(())
    }

    /// Refresh when the snapshot aged past the configured threshold or a
    /// previous error marked it stale.
    pub async fn maybe_refresh(&mut self) -> Result<(), ApiError> {
        let age_ms = self
            .services
            .clock
            .now_ms()
            .saturating_sub(self.last_refresh_ms);
        if self.stale || age_ms > self.settings.refresh_stale_secs * 1_000 {
            self.refresh().await?;
        }
        Ok(())
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
        self.publish();
    }

    pub fn set_status(&mut self, status: CharacterStatus) {
        self.status = status;
        self.publish();
    }

    /// Fold the action's cooldown and updated character into local state.
    pub fn apply_action(&mut self, action: &str, result: &ActionResult) {
        let now = self.services.clock.now_ms();
        let remaining_ms = (result.cooldown.remaining_seconds.max(0.0) * 1_000.0).ceil() as u64;
        self.cooldown_until_ms = now + remaining_ms;
        self.last_action = action.to_string();

        if let Some(character) = &result.character {
            self.live = character.clone();
            self.last_refresh_ms = now;
            self.stale = false;
            self.push_carried();
        }

        debug!(
            character = %self.name,
            action,
            cooldown_ms = remaining_ms,
            "action applied"
        );
        self.publish();
    }

    pub fn carried_counts(&self) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for slot in &self.live.inventory {
            if !slot.code.is_empty() && slot.quantity > 0 {
                *counts.entry(slot.code.clone()).or_insert(0) += slot.quantity;
            }
        }
        counts
    }

    fn push_carried(&self) {
        self.services
            .ledger
            .set_carried(&self.name, self.carried_counts());
    }

    fn publish(&self) {
        let view = CharacterView::from_live(
            &self.live,
            self.status,
            self.stale,
            self.cooldown_until_ms,
            &self.last_action,
        );
        self.services.status.publish_character(view);
    }

    // --- actions ---

    async fn act(
        &mut self,
        action: &str,
        call: impl std::future::Future<Output = Result<ActionResult, ApiError>>,
    ) -> Result<ActionResult, ApiError> {
        self.wait_for_cooldown().await;
        let result = call.await?;
        self.apply_action(action, &result);
        Ok(result)
    }

    /// Move to a tile; a no-op when already there.
    pub async fn move_to(&mut self, x: i32, y: i32) -> Result<(), ApiError> {
        if self.live.is_at(x, y) {
            return Ok(());
        }
        let api = self.services.api.clone();
        let name = self.name.clone();
        self.act("move", async move { api.move_to(&name, x, y).await })
            .await?;
        Ok(())
    }

    pub async fn fight(&mut self) -> Result<Option<FightOutcome>, ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        let result = self.act("fight", async move { api.fight(&name).await }).await?;
        Ok(result.fight)
    }

    pub async fn gather(&mut self) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        self.act("gather", async move { api.gather(&name).await })
            .await?;
        Ok(())
    }

    pub async fn craft(&mut self, code: &str, quantity: u32) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        let code = code.to_string();
        self.act("craft", async move { api.craft(&name, &code, quantity).await })
            .await?;
        Ok(())
    }

    pub async fn rest_action(&mut self) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        self.act("rest", async move { api.rest(&name).await }).await?;
        Ok(())
    }

    pub async fn use_item(&mut self, code: &str, quantity: u32) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        let code = code.to_string();
        self.act("use", async move { api.use_item(&name, &code, quantity).await })
            .await?;
        Ok(())
    }

    pub async fn recycle(&mut self, code: &str, quantity: u32) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        let code = code.to_string();
        self.act("recycle", async move { api.recycle(&name, &code, quantity).await })
            .await?;
        Ok(())
    }

    pub async fn sell(&mut self, code: &str, quantity: u32) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        let code = code.to_string();
        self.act("sell", async move { api.sell(&name, &code, quantity).await })
            .await?;
        Ok(())
    }

    /// Raw withdraw of one line. Ledger bookkeeping is the caller's job
    /// (see `bank::ops`), because it owns the reservations.
    pub async fn withdraw_line(&mut self, line: &SimpleItem) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        let items = vec![line.clone()];
        self.act("withdraw", async move { api.withdraw_bank(&name, &items).await })
            .await?;
        Ok(())
    }

    pub async fn deposit_lines(&mut self, lines: &[SimpleItem]) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        let items = lines.to_vec();
        self.act("deposit", async move { api.deposit_bank(&name, &items).await })
            .await?;
        Ok(())
    }

    pub async fn deposit_gold(&mut self, quantity: u64) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        self.act("deposit_gold", async move { api.deposit_gold(&name, quantity).await })
            .await?;
        Ok(())
    }

    pub async fn withdraw_gold(&mut self, quantity: u64) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        self.act("withdraw_gold", async move { api.withdraw_gold(&name, quantity).await })
            .await?;
        Ok(())
    }

    pub async fn buy_bank_expansion(&mut self) -> Result<Option<BankDetails>, ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        let result = self
            .act("buy_expansion", async move { api.buy_bank_expansion(&name).await })
            .await?;
        Ok(result.bank)
    }

    pub async fn complete_task(&mut self) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        self.act("complete_task", async move { api.complete_task(&name).await })
            .await?;
        Ok(())
    }

    pub async fn accept_task(&mut self) -> Result<(), ApiError> {
        let api = self.services.api.clone();
        let name = self.name.clone();
        self.act("accept_task", async move { api.accept_task(&name).await })
            .await?;
        Ok(())
    }

    /// Used by tests and bootstrap to place cooldown state.
    pub fn set_cooldown_until_ms(&mut self, when_ms: u64) {
        self.cooldown_until_ms = when_ms;
    }
}
