//! Process-wide inventory coordination.
//!
//! One [`InventoryLedger`] instance is shared by every character worker and
//! the status bus. It caches the bank, tracks withdraw reservations so two
//! characters never double-count the same items, and answers roster-wide
//! quantity questions.

pub mod ledger;
pub mod model;

pub use ledger::{BankSource, DeltaDirection, InventoryLedger};
pub use model::{BankSummary, Reservation, ReservationId, ReserveOutcome, normalize_lines};
