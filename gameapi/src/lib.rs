//! Game server API: domain types, error taxonomy and the HTTP client.
//!
//! Everything above this crate consumes the [`GameApi`] trait, never the
//! concrete client, so tests substitute mocks and no other crate knows about
//! HTTP.

pub mod client;
pub mod error;
pub mod staticdata;
pub mod types;

pub use client::HttpGameClient;
pub use error::{ApiError, ErrorKind};
pub use staticdata::{
    EffectSpec, ItemData, MonsterData, Recipe, ResourceData, StaticData, StaticIndex, UseCondition,
};
pub use types::*;

/// Every operation the agent performs against the game server.
///
/// All action calls return an [`ActionResult`] carrying the cooldown and,
/// where the server provides one, the updated character snapshot.
#[async_trait::async_trait]
pub trait GameApi: Send + Sync {
    // --- reads ---
    async fn get_my_characters(&self) -> Result<Vec<CharacterData>, ApiError>;
    async fn get_character(&self, name: &str) -> Result<CharacterData, ApiError>;
    async fn get_maps(&self, filter: MapFilter) -> Result<Page<MapTile>, ApiError>;
    async fn get_bank_details(&self) -> Result<BankDetails, ApiError>;
    async fn get_bank_items(&self, page: u32) -> Result<Page<SimpleItem>, ApiError>;
    async fn get_active_events(&self) -> Result<Vec<ActiveEvent>, ApiError>;
    async fn get_server_details(&self) -> Result<ServerDetails, ApiError>;
    async fn get_achievements(&self, page: u32, size: u32) -> Result<Page<AchievementData>, ApiError>;

    // --- actions ---
    async fn move_to(&self, name: &str, x: i32, y: i32) -> Result<ActionResult, ApiError>;
    async fn fight(&self, name: &str) -> Result<ActionResult, ApiError>;
    async fn gather(&self, name: &str) -> Result<ActionResult, ApiError>;
    async fn craft(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError>;
    async fn rest(&self, name: &str) -> Result<ActionResult, ApiError>;
    async fn use_item(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError>;
    async fn recycle(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError>;
    async fn equip(&self, name: &str, code: &str, slot: &str) -> Result<ActionResult, ApiError>;
    async fn unequip(&self, name: &str, slot: &str) -> Result<ActionResult, ApiError>;
    async fn sell(&self, name: &str, code: &str, quantity: u32) -> Result<ActionResult, ApiError>;

    // --- bank actions ---
    async fn deposit_bank(&self, name: &str, items: &[SimpleItem]) -> Result<ActionResult, ApiError>;
    async fn withdraw_bank(&self, name: &str, items: &[SimpleItem]) -> Result<ActionResult, ApiError>;
    async fn deposit_gold(&self, name: &str, quantity: u64) -> Result<ActionResult, ApiError>;
    async fn withdraw_gold(&self, name: &str, quantity: u64) -> Result<ActionResult, ApiError>;
    async fn buy_bank_expansion(&self, name: &str) -> Result<ActionResult, ApiError>;

    // --- tasks ---
    async fn complete_task(&self, name: &str) -> Result<ActionResult, ApiError>;
    async fn accept_task(&self, name: &str) -> Result<ActionResult, ApiError>;

    // --- sandbox-only account manipulation ---
    // Real servers reject these; the defaults make that explicit so only
    // sandbox-aware clients bother overriding them.
    async fn sandbox_give_gold(&self, _name: &str, _quantity: u64) -> Result<(), ApiError> {
        Err(ApiError::Http {
            status: 501,
            message: "sandbox endpoints unavailable".into(),
        })
    }
    async fn sandbox_give_item(&self, _name: &str, _code: &str, _quantity: u32) -> Result<(), ApiError> {
        Err(ApiError::Http {
            status: 501,
            message: "sandbox endpoints unavailable".into(),
        })
    }
    async fn sandbox_give_xp(&self, _name: &str, _skill: &str, _quantity: u64) -> Result<(), ApiError> {
        Err(ApiError::Http {
            status: 501,
            message: "sandbox endpoints unavailable".into(),
        })
    }
    async fn sandbox_spawn_event(&self, _code: &str) -> Result<(), ApiError> {
        Err(ApiError::Http {
            status: 501,
            message: "sandbox endpoints unavailable".into(),
        })
    }
    async fn sandbox_reset_account(&self) -> Result<(), ApiError> {
        Err(ApiError::Http {
            status: 501,
            message: "sandbox endpoints unavailable".into(),
        })
    }
}
