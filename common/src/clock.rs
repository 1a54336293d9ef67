//! Time source used by every service that reasons about wall-clock time.
//!
//! Production code uses [`SystemClock`]; tests construct a [`ManualClock`]
//! and advance it explicitly, so cooldown and lease logic stays deterministic.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;

    /// Suspend the caller until the given wall-clock time.
    /// Returns immediately when `deadline_ms` is already in the past.
    async fn sleep_until_ms(&self, deadline_ms: u64);
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }

    async fn sleep_until_ms(&self, deadline_ms: u64) {
        let now = self.now_ms();
        if deadline_ms > now {
            tokio::time::sleep(std::time::Duration::from_millis(deadline_ms - now)).await;
        }
    }
}

/// Test clock with an explicit cursor. `sleep_until_ms` jumps the cursor
/// forward instead of awaiting, so tests never depend on real time.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Mutex::new(start_ms),
        }
    }

    pub fn advance(&self, delta_ms: u64) {
        *self.now.lock() += delta_ms;
    }

    pub fn shared(start_ms: u64) -> Arc<Self> {
        Arc::new(Self::new(start_ms))
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        *self.now.lock()
    }

    async fn sleep_until_ms(&self, deadline_ms: u64) {
        let mut now = self.now.lock();
        if deadline_ms > *now {
            *now = deadline_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_clock_advances_on_sleep() {
        let clock = ManualClock::new(1_000);
        clock.sleep_until_ms(5_000).await;
        assert_eq!(clock.now_ms(), 5_000);

        // Past deadlines never rewind the cursor.
        clock.sleep_until_ms(2_000).await;
        assert_eq!(clock.now_ms(), 5_000);
    }

    #[test]
    fn manual_clock_advance() {
        let clock = ManualClock::new(0);
        clock.advance(250);
        clock.advance(250);
        assert_eq!(clock.now_ms(), 500);
    }
}
