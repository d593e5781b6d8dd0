//! Minimum-interval throttle. One instance per channel serializes all
//! sends on that channel across every space.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces consecutive `acquire` completions at least `min_interval`
/// apart. Waiters queue on the internal mutex, so bursts drain at the
/// configured pace instead of stampeding.
pub struct Throttle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until this channel is allowed to send again.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let next_allowed = previous + self.min_interval;
            let now = Instant::now();
            if next_allowed > now {
                tokio::time::sleep_until(next_allowed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
