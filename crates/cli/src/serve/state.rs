//! Shared server state: the controller and the per-IP request budget.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use tokio::sync::Mutex;

use wayfinder_engine::LifecycleController;
use wayfinder_storage::MemoryStore;

use super::RATE_LIMIT_WINDOW_SECS;

/// One caller's request count within the current window.
struct Window {
    started: Instant,
    count: u64,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started).as_secs() >= RATE_LIMIT_WINDOW_SECS
    }

    fn remaining_secs(&self, now: Instant) -> u64 {
        RATE_LIMIT_WINDOW_SECS.saturating_sub(now.duration_since(self.started).as_secs())
    }
}

/// Fixed-window per-IP rate limiter. Expired windows are pruned on every
/// check so the map stays bounded by the set of currently active callers.
pub(crate) struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    limit: u64,
}

impl RateLimiter {
    pub(crate) fn new(limit: u64) -> Self {
        RateLimiter {
            windows: Mutex::new(HashMap::new()),
            limit,
        }
    }

    /// Count one request against the caller's window. `Err` carries the
    /// seconds until the window resets.
    pub(crate) async fn try_acquire(&self, ip: IpAddr) -> Result<(), u64> {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        windows.retain(|_, window| !window.expired(now));

        let window = windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        window.count += 1;
        if window.count > self.limit {
            Err(window.remaining_secs(now))
        } else {
            Ok(())
        }
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    /// The lifecycle controller over the shared in-process store.
    pub(crate) controller: LifecycleController<MemoryStore>,
    /// Per-IP rate limiter.
    pub(crate) rate_limiter: RateLimiter,
    /// Optional API key; `None` disables authentication.
    pub(crate) api_key: Option<String>,
}
