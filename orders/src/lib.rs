//! The order board: a persistent cross-character work queue.
//!
//! Characters post orders for items they need; other characters claim them
//! under a time-bounded lease, produce the items, and deposits credit the
//! orders through the bank deposit hook. A single JSON file is the source of
//! truth across restarts.

pub mod board;
pub mod model;
pub mod store;

pub use board::{Contribution, OrderBoard};
pub use model::{BlockReason, Claim, NewOrder, Order, OrderId, OrderStatus, SourceType};
pub use store::{JsonFileStore, MemoryStore, OrderBoardError, OrderStore};
