//! Bank logistics: tile discovery, travel planning and the guarded
//! withdraw/deposit ladders.

pub mod ops;
pub mod tiles;
pub mod travel;

pub use ops::{
    SkippedLine, WithdrawMode, WithdrawReport, WithdrawRequest, deposit, deposit_all,
    deposit_gold_above, withdraw, withdraw_gold,
};
pub use tiles::{BankTile, BankTileCache};
pub use travel::ensure_at_bank;
