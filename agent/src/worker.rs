//! Per-character worker loop.
//!
//! One task per character: wait out the cooldown, refresh a stale snapshot,
//! then let the highest-priority runnable routine act. Expected errors were
//! already translated into block entries by the routines; anything that
//! bubbles up here marks the character stale and the loop carries on. Only
//! the stop signal ends the loop.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use gameapi::ApiError;
use status::CharacterStatus;

use crate::context::CharacterContext;
use crate::routines::Routine;

const IDLE_SLEEP_MS: u64 = 1_000;

pub struct CharacterWorker {
    ctx: CharacterContext,
    routines: Vec<Arc<dyn Routine>>,
    stop: watch::Receiver<bool>,
}

impl CharacterWorker {
    pub fn new(
        ctx: CharacterContext,
        mut routines: Vec<Arc<dyn Routine>>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        routines.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self {
            ctx,
            routines,
            stop,
        }
    }

    fn stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Sleep until the character's cooldown ends, abandoning the wait the
    /// moment a stop is signalled.
    async fn interruptible_cooldown_wait(&mut self) {
        let wait = self.ctx.wait_for_cooldown();
        tokio::pin!(wait);
        tokio::select! {
            _ = &mut wait => {}
            _ = self.stop.changed() => {}
        }
    }

    async fn idle_sleep(&mut self) {
        let deadline = self.ctx.services().clock.now_ms() + IDLE_SLEEP_MS;
        let clock = self.ctx.services().clock.clone();
        let sleep = clock.sleep_until_ms(deadline);
        tokio::pin!(sleep);
        tokio::select! {
            _ = &mut sleep => {}
            _ = self.stop.changed() => {}
        }
    }

    pub async fn run(mut self) {
        info!(character = %self.ctx.name(), "worker starting");
        self.ctx.set_status(CharacterStatus::Running);

        while !self.stopped() {
            self.interruptible_cooldown_wait().await;
            if self.stopped() {
                break;
            }

            if let Err(e) = self.ctx.maybe_refresh().await {
                warn!(
                    character = %self.ctx.name(),
                    kind = e.kind().as_str(),
                    error = %e,
                    "refresh failed"
                );
                self.ctx.mark_stale();
                self.idle_sleep().await;
                continue;
            }

            let mut ran = false;
            for routine in &self.routines {
                if !routine.can_run(&self.ctx).await {
                    continue;
                }
                debug!(character = %self.ctx.name(), routine = routine.name(), "routine selected");

                if let Err(e) = routine.execute(&mut self.ctx).await {
                    handle_failure(&mut self.ctx, routine.name(), &e);
                }
                ran = true;
                break;
            }

            if !ran {
                self.idle_sleep().await;
            }
        }

        self.ctx.set_status(CharacterStatus::Stopping);
        info!(character = %self.ctx.name(), "worker stopped");
    }

}

fn handle_failure(ctx: &mut CharacterContext, routine: &str, e: &anyhow::Error) {
    match e.downcast_ref::<ApiError>() {
        Some(api_err) => {
            // Transport retries already happened inside the client; at
            // this level every kind just costs one refresh.
            warn!(
                character = %ctx.name(),
                routine,
                kind = api_err.kind().as_str(),
                error = %api_err,
                "routine failed"
            );
        }
        None => {
            error!(
                character = %ctx.name(),
                routine,
                error = %e,
                "routine failed unexpectedly"
            );
        }
    }
    ctx.mark_stale();
}
