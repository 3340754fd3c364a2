//! Minimum spacing between outgoing requests
//!
//! One limiter is shared by the fragment fetch and every concurrent member
//! dereference. Callers queue on an async mutex (FIFO) and hold it while they
//! wait out the spacing, so two requests never leave closer together than the
//! configured interval.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Serializing request throttle
#[derive(Debug)]
pub struct RateLimiter {
    spacing: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter with a fixed spacing between requests
    ///
    /// A zero spacing means unlimited.
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_request: Mutex::new(None),
        }
    }

    /// Creates a limiter from a requests-per-minute budget
    ///
    /// # Arguments
    ///
    /// * `requests_per_minute` - Budget; `None` or a non-positive value means unlimited
    pub fn per_minute(requests_per_minute: Option<f64>) -> Self {
        let spacing = match requests_per_minute {
            Some(rpm) if rpm.is_finite() && rpm > 0.0 => Duration::from_secs_f64(60.0 / rpm),
            _ => Duration::ZERO,
        };
        Self::new(spacing)
    }

    /// Creates a limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Time enforced between two consecutive requests
    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Waits until a request to `target` may be sent
    ///
    /// Resolves only after `spacing` has elapsed since the previous call
    /// resolved. Concurrent callers are served one at a time in arrival order.
    pub async fn plan_request(&self, target: &str) {
        if self.spacing.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.spacing;
            if ready_at > Instant::now() {
                tracing::trace!(
                    "Rate limiting {} for {:?}",
                    target,
                    ready_at - Instant::now()
                );
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
