// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user sliding-window rate limiter for the AI coach.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const CHAT_REQUESTS_PER_HOUR: usize = 20;
const WINDOW: Duration = Duration::from_secs(3600);
/// Idle users are swept out once every this many checks.
const SWEEP_EVERY: u64 = 256;

pub struct ChatRateLimiter {
    limit: usize,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
    checks: AtomicU64,
}

impl Default for ChatRateLimiter {
    fn default() -> Self {
        Self::new(CHAT_REQUESTS_PER_HOUR, WINDOW)
    }
}

impl ChatRateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Record a request at `now`. Returns the wait until a slot frees up when
    /// the user is over the limit (the request is then not recorded).
    pub fn check_at(&self, user_id: &str, now: Instant) -> Result<(), Duration> {
        let result = self.record(user_id, now);

        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep(now);
        }
        result
    }

    fn record(&self, user_id: &str, now: Instant) -> Result<(), Duration> {
        let mut entry = self.hits.entry(user_id.to_string()).or_default();

        while entry
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            entry.pop_front();
        }

        if entry.len() >= self.limit {
            let oldest = entry.front().copied().unwrap_or(now);
            return Err(self
                .window
                .saturating_sub(now.saturating_duration_since(oldest)));
        }

        entry.push_back(now);
        Ok(())
    }

    /// Forget users whose last request has left the window.
    pub fn sweep(&self, now: Instant) {
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|t| now.saturating_duration_since(*t) < self.window)
        });
    }

    /// Number of users currently tracked.
    pub fn tracked_users(&self) -> usize {
        self.hits.len()
    }

    pub fn check(&self, user_id: &str) -> Result<(), Duration> {
        self.check_at(user_id, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_user() {
        let limiter = ChatRateLimiter::new(3, Duration::from_secs(60));
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("u1", t0).is_ok());
        }
        assert!(limiter.check_at("u1", t0).is_err());
        // Other users are unaffected
        assert!(limiter.check_at("u2", t0).is_ok());
    }

    #[test]
    fn test_window_slides() {
        let limiter = ChatRateLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();

        limiter.check_at("u1", t0).unwrap();
        limiter.check_at("u1", t0 + Duration::from_secs(30)).unwrap();

        let wait = limiter
            .check_at("u1", t0 + Duration::from_secs(40))
            .unwrap_err();
        assert_eq!(wait, Duration::from_secs(20));

        assert!(limiter.check_at("u1", t0 + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn test_sweep_forgets_idle_users() {
        let limiter = ChatRateLimiter::new(5, Duration::from_secs(60));
        let t0 = Instant::now();

        limiter.check_at("idle", t0).unwrap();
        limiter.check_at("active", t0 + Duration::from_secs(50)).unwrap();
        assert_eq!(limiter.tracked_users(), 2);

        limiter.sweep(t0 + Duration::from_secs(70));
        assert_eq!(limiter.tracked_users(), 1);

        limiter.sweep(t0 + Duration::from_secs(120));
        assert_eq!(limiter.tracked_users(), 0);
    }

    #[test]
    fn test_checks_trigger_periodic_sweep() {
        let limiter = ChatRateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(120);

        for i in 0..(SWEEP_EVERY - 1) {
            let _ = limiter.check_at(&format!("user-{}", i), t0);
        }
        assert_eq!(limiter.tracked_users(), (SWEEP_EVERY - 1) as usize);

        // This check lands on the sweep boundary, long after the others.
        limiter.check_at("latecomer", later).unwrap();
        assert_eq!(limiter.tracked_users(), 1);
    }
}
