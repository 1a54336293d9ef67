use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;

use common::Clock;

use crate::views::{BankView, CharacterView, OrderRow, Snapshot};

#[derive(Default)]
struct BusState {
    characters: BTreeMap<String, CharacterView>,
    orders: Vec<OrderRow>,
    bank: BankView,
}

/// Aggregates partial updates into immutable snapshots.
///
/// Writers never block on readers: state mutation happens under a short
/// rwlock section, then the rebuilt snapshot is pushed through the watch
/// channel. Consumers hold a receiver and always see the latest value.
pub struct StatusBus {
    clock: Arc<dyn Clock>,
    state: RwLock<BusState>,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl StatusBus {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            clock,
            state: RwLock::new(BusState::default()),
            tx,
        }
    }

    pub fn publish_character(&self, view: CharacterView) {
        {
            let mut state = self.state.write();
            state.characters.insert(view.name.clone(), view);
        }
        self.rebuild();
    }

    pub fn publish_orders(&self, rows: Vec<OrderRow>) {
        self.state.write().orders = rows;
        self.rebuild();
    }

    pub fn publish_bank(&self, view: BankView) {
        self.state.write().bank = view;
        self.rebuild();
    }

    fn rebuild(&self) {
        let now_ms = self.clock.now_ms();
        let snapshot = {
            let state = self.state.read();
            Snapshot {
                generated_at_ms: now_ms,
                generated_at: Utc
                    .timestamp_millis_opt(now_ms as i64)
                    .single()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                characters: state.characters.values().cloned().collect(),
                orders: state.orders.clone(),
                bank: state.bank.clone(),
            }
        };
        self.tx.send_replace(Arc::new(snapshot));
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }
}
