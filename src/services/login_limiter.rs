//! Failed-login throttling.
//!
//! Counters live in process memory, so they reset on restart and are not
//! shared between instances. Single-instance deployments only. Entries whose
//! window and lockout have both run out are dropped on lookup and by a sweep
//! that runs at most once per window.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct AttemptWindow {
    failures: u32,
    window_started: Instant,
    locked_until: Option<Instant>,
}

impl AttemptWindow {
    /// Nothing left to enforce: lockout over and counting window closed
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        let unlocked = self.locked_until.map(|until| until <= now).unwrap_or(true);
        unlocked && now.saturating_duration_since(self.window_started) > window
    }
}

#[derive(Debug)]
pub struct LoginRateLimiter {
    attempts: DashMap<String, AttemptWindow>,
    max_attempts: u32,
    window: Duration,
    lockout: Duration,
    next_sweep: Mutex<Instant>,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: u32, window: Duration, lockout: Duration) -> Self {
        Self {
            attempts: DashMap::new(),
            max_attempts: max_attempts.max(1),
            window,
            lockout,
            next_sweep: Mutex::new(Instant::now() + window),
        }
    }

    /// Remaining lockout for `key`, if any
    pub fn locked_for(&self, key: &str) -> Option<Duration> {
        self.locked_for_at(key, Instant::now())
    }

    pub fn record_failure(&self, key: &str) {
        self.record_failure_at(key, Instant::now())
    }

    pub fn record_success(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Tracked keys, including ones not yet swept
    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }

    fn locked_for_at(&self, key: &str, now: Instant) -> Option<Duration> {
        self.attempts
            .remove_if(key, |_, window| window.is_stale(now, self.window));
        let entry = self.attempts.get(key)?;
        let until = entry.locked_until?;
        until.checked_duration_since(now).filter(|d| !d.is_zero())
    }

    fn sweep_at(&self, now: Instant) {
        let due = match self.next_sweep.lock() {
            Ok(mut next) if *next <= now => {
                *next = now + self.window.max(Duration::from_secs(1));
                true
            }
            _ => false,
        };
        if due {
            self.attempts
                .retain(|_, window| !window.is_stale(now, self.window));
        }
    }

    fn record_failure_at(&self, key: &str, now: Instant) {
        self.sweep_at(now);

        let mut entry = self
            .attempts
            .entry(key.to_string())
            .or_insert_with(|| AttemptWindow {
                failures: 0,
                window_started: now,
                locked_until: None,
            });

        let lock_expired = entry.locked_until.map(|until| until <= now).unwrap_or(false);
        if lock_expired || now.duration_since(entry.window_started) > self.window {
            entry.failures = 0;
            entry.window_started = now;
            entry.locked_until = None;
        }

        entry.failures += 1;
        if entry.failures >= self.max_attempts {
            entry.locked_until = Some(now + self.lockout);
        }
    }
}
