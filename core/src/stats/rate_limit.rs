use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Sliding window limiter: at most `limit` acquisitions in any `window`.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            grants: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a request may be made, then record it.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                None => return,
                Some(retry_at) => sleep_until(retry_at).await,
            }
        }
    }

    /// Record a request if the window has room, else return when it will.
    fn try_acquire(&self) -> Option<Instant> {
        let now = Instant::now();
        let mut grants = self.grants.lock().unwrap_or_else(|e| e.into_inner());

        while grants.front().is_some_and(|t| *t + self.window <= now) {
            grants.pop_front();
        }
        if grants.len() < self.limit {
            grants.push_back(now);
            return None;
        }
        grants.front().map(|t| *t + self.window)
    }

    /// Requests still allowed in the current window.
    pub fn remaining(&self) -> usize {
        let now = Instant::now();
        let grants = self.grants.lock().unwrap_or_else(|e| e.into_inner());
        let active = grants.iter().filter(|t| **t + self.window > now).count();
        self.limit.saturating_sub(active)
    }
}
