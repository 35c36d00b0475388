use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Enforces a minimum spacing between outbound requests.
///
/// No burst allowance: each `acquire` waits until `min_interval` has passed
/// since the previous one returned. The lock is held while waiting, so
/// concurrent callers are let through one interval apart.
pub struct RateLimiter {
  min_interval: Duration,
  last_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
  pub fn new(min_interval: Duration) -> Self {
    Self {
      min_interval,
      last_permit: Mutex::new(None),
    }
  }

  pub fn min_interval(&self) -> Duration {
    self.min_interval
  }

  /// Wait for permission to send the next request. Never fails.
  pub async fn acquire(&self) {
    let mut last = self.last_permit.lock().await;

    if let Some(previous) = *last {
      let ready_at = previous + self.min_interval;
      if Instant::now() < ready_at {
        trace!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "rate limited");
        sleep_until(ready_at).await;
      }
    }

    *last = Some(Instant::now());
  }
}
