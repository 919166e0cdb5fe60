//! # Feature: Rate Limiting
//!
//! Per-user sliding window over command invocations. Scheduler traffic is
//! never throttled; only messages that parse as commands are counted.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Keyed by Discord user id only, report how long until the next
//!   slot frees up
//! - 1.0.0: Initial release with per-user sliding window rate limiting

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Over the limit; the oldest counted request leaves the window after this
    Limited { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

pub struct RateLimiter {
    requests: DashMap<u64, Vec<Instant>>,
    max_requests: usize,
    time_window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            time_window,
        }
    }

    /// Count one request for `user_id` if it fits in the window.
    pub fn check(&self, user_id: u64) -> Admission {
        self.check_at(user_id, Instant::now())
    }

    fn check_at(&self, user_id: u64, now: Instant) -> Admission {
        let mut entry = self.requests.entry(user_id).or_default();
        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() < self.max_requests {
            entry.push(now);
            return Admission::Allowed;
        }

        let retry_after = entry
            .first()
            .map(|&oldest| self.time_window.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(self.time_window);
        Admission::Limited { retry_after }
    }

    /// Drop users with no requests left in the window
    pub fn prune(&self) {
        let now = Instant::now();
        self.requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.time_window);
            !times.is_empty()
        });
    }

    pub fn tracked_users(&self) -> usize {
        self.requests.len()
    }
}
