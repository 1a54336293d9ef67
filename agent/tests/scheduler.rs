//! Worker loop: priority selection, fallback and stop handling.

mod mock_api;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::watch;

use agent::routines::Routine;
use agent::{CharacterContext, CharacterWorker};
use common::ManualClock;
use mock_api::{MockGameApi, mk_character, test_services, worker_settings};

struct Urgent {
    budget: u32,
    executed: Arc<AtomicU32>,
}

#[async_trait::async_trait]
impl Routine for Urgent {
    fn name(&self) -> &'static str {
        "urgent"
    }

    fn priority(&self) -> u32 {
        90
    }

    async fn can_run(&self, _ctx: &CharacterContext) -> bool {
        self.executed.load(Ordering::SeqCst) < self.budget
    }

    async fn execute(&self, _ctx: &mut CharacterContext) -> anyhow::Result<()> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Fallback {
    executed: Arc<AtomicU32>,
    urgent_count: Arc<AtomicU32>,
    stop_tx: watch::Sender<bool>,
}

#[async_trait::async_trait]
impl Routine for Fallback {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn priority(&self) -> u32 {
        5
    }

    async fn can_run(&self, _ctx: &CharacterContext) -> bool {
        true
    }

    async fn execute(&self, _ctx: &mut CharacterContext) -> anyhow::Result<()> {
        // The fallback only gets a turn once the urgent routine is done.
        assert_eq!(self.urgent_count.load(Ordering::SeqCst), 3);
        self.executed.fetch_add(1, Ordering::SeqCst);
        let _ = self.stop_tx.send(true);
        Ok(())
    }
}

#[tokio::test]
async fn priority_wins_until_exhausted_then_fallback_runs() {
    let api = Arc::new(MockGameApi::new());
    api.add_character(mk_character("Worker", 0, 0, 10));

    let clock = ManualClock::shared(1_000_000);
    let services = test_services(api.clone(), clock).await;
    let live = services.api.get_character("Worker").await.unwrap();
    let ctx = CharacterContext::new(worker_settings(), services, live);

    let urgent_count = Arc::new(AtomicU32::new(0));
    let fallback_count = Arc::new(AtomicU32::new(0));
    let (stop_tx, stop_rx) = watch::channel(false);

    let routines: Vec<Arc<dyn Routine>> = vec![
        Arc::new(Fallback {
            executed: fallback_count.clone(),
            urgent_count: urgent_count.clone(),
            stop_tx,
        }),
        Arc::new(Urgent {
            budget: 3,
            executed: urgent_count.clone(),
        }),
    ];

    CharacterWorker::new(ctx, routines, stop_rx).run().await;

    assert_eq!(urgent_count.load(Ordering::SeqCst), 3);
    assert_eq!(fallback_count.load(Ordering::SeqCst), 1);
}

struct Failing {
    attempts: Arc<AtomicU32>,
    stop_tx: watch::Sender<bool>,
}

#[async_trait::async_trait]
impl Routine for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn priority(&self) -> u32 {
        50
    }

    async fn can_run(&self, _ctx: &CharacterContext) -> bool {
        self.attempts.load(Ordering::SeqCst) < 2
    }

    async fn execute(&self, _ctx: &mut CharacterContext) -> anyhow::Result<()> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
            let _ = self.stop_tx.send(true);
        }
        anyhow::bail!("synthetic failure")
    }
}

#[tokio::test]
async fn routine_failures_do_not_kill_the_loop() {
    let api = Arc::new(MockGameApi::new());
    api.add_character(mk_character("Worker", 0, 0, 10));

    let clock = ManualClock::shared(1_000_000);
    let services = test_services(api.clone(), clock).await;
    let live = services.api.get_character("Worker").await.unwrap();
    let ctx = CharacterContext::new(worker_settings(), services, live);

    let attempts = Arc::new(AtomicU32::new(0));
    let (stop_tx, stop_rx) = watch::channel(false);

    let routines: Vec<Arc<dyn Routine>> = vec![Arc::new(Failing {
        attempts: attempts.clone(),
        stop_tx,
    })];

    CharacterWorker::new(ctx, routines, stop_rx).run().await;

    assert_eq!(
        attempts.load(Ordering::SeqCst),
        2,
        "the loop keeps scheduling after a failure"
    );
}
