//! Status surface: snapshot aggregation and the dashboard-facing HTTP API.
//!
//! Workers publish partial updates into the [`StatusBus`]; every publish
//! folds into a fresh immutable snapshot pushed over a watch channel. The
//! HTTP layer only ever reads snapshots, so a slow or absent dashboard never
//! back-pressures the workers.

pub mod bus;
pub mod http;
pub mod views;

pub use bus::StatusBus;
pub use http::{AppState, ConfigHandle, ControlActions, ControlState, SandboxActions, router, serve};
pub use views::*;
