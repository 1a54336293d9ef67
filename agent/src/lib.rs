//! The agent core: per-character contexts, bank logistics, routines and the
//! scheduler loop that keeps every character busy between cooldowns.

pub mod bank;
pub mod context;
pub mod routines;
pub mod worker;

pub use context::{CharacterContext, Services};
pub use worker::CharacterWorker;
