//! Rate limiting for upstream provider requests.
//!
//! Sliding-window limiter that keeps provider calls under the documented
//! budget (30 requests per second on the Finnhub free tier).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

/// Poll interval while waiting for capacity.
const WAIT_POLL: Duration = Duration::from_millis(20);

/// Sliding-window rate limiter.
pub struct RateLimiter {
    /// Maximum requests per window.
    max_requests: u32,
    /// Window length.
    window: Duration,
    /// Timestamps of recent requests.
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window
    /// * `window` - Window length
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests as usize)),
        }
    }

    /// Limiter for `per_second` requests per second.
    pub fn per_second(per_second: u32) -> Self {
        Self::new(per_second, Duration::from_secs(1))
    }

    /// Record a request if the window has room. Check and record are atomic.
    pub fn try_acquire(&self) -> bool {
        let mut timestamps = self.timestamps.lock();
        Self::cleanup(&mut timestamps, self.window);

        if timestamps.len() >= self.max_requests as usize {
            return false;
        }

        timestamps.push_back(Instant::now());
        if timestamps.len() == self.max_requests as usize {
            warn!(
                count = timestamps.len(),
                max = self.max_requests,
                "Provider rate limit window full"
            );
        }
        true
    }

    /// Wait until a request slot is available, then take it.
    pub async fn acquire(&self) {
        while !self.try_acquire() {
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    /// Requests recorded in the current window.
    pub fn current_count(&self) -> u32 {
        let mut timestamps = self.timestamps.lock();
        Self::cleanup(&mut timestamps, self.window);
        timestamps.len() as u32
    }

    /// Remaining capacity in the current window.
    pub fn remaining_capacity(&self) -> u32 {
        self.max_requests.saturating_sub(self.current_count())
    }

    fn cleanup(timestamps: &mut VecDeque<Instant>, window: Duration) {
        let Some(cutoff) = Instant::now().checked_sub(window) else {
            return;
        };
        while timestamps.front().is_some_and(|&t| t < cutoff) {
            timestamps.pop_front();
        }
    }

    /// Reset limiter state.
    pub fn reset(&self) {
        self.timestamps.lock().clear();
    }
}
