//! Process-wide rate limiter for document store calls.
//!
//! A fixed-window counter: at most `max_per_window` calls are admitted per
//! `window`. Once the budget is spent, [`RateLimiter::acquire`] sleeps on
//! the tokio timer until the window rolls over instead of failing, so a
//! blocked caller holds no worker thread while it waits.
//!
//! One limiter instance is shared (behind `Arc`) by every store call site,
//! including the concurrent per-token searches of the keyword tier. The
//! counter's read-modify-write happens under a `tokio::sync::Mutex`.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::RateLimitConfig;

/// Snapshot of the current admission window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub window_start: Instant,
    pub count: usize,
}

pub struct RateLimiter {
    window: Duration,
    max_per_window: usize,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    /// A `max_per_window` of 0 is treated as 1 so `acquire` can always make progress.
    pub fn new(window: Duration, max_per_window: usize) -> Self {
        Self {
            window,
            max_per_window: max_per_window.max(1),
            state: Mutex::new(RateWindow {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.window(), config.max_per_window)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    /// Wait until a call is admitted in the current window.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                if now.duration_since(state.window_start) >= self.window {
                    state.window_start = now;
                    state.count = 0;
                }

                if state.count < self.max_per_window {
                    state.count += 1;
                    debug!(
                        count = state.count,
                        max = self.max_per_window,
                        "rate limiter: admitted"
                    );
                    return;
                }

                (state.window_start + self.window).saturating_duration_since(now)
            };

            debug!(?wait, "rate limiter: window full, waiting");
            sleep(wait).await;
        }
    }

    pub async fn current_window(&self) -> RateWindow {
        *self.state.lock().await
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
