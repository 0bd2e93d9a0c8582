//! Reconnection backoff: configuration and per-connection retry state.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the client retries after an unexpected disconnect.
///
/// The backoff schedule is `base_delay * 2^i`, with `i` clamped to
/// `max_attempts - 1` and the result capped at `max_delay`. The defaults give
/// 1 s, 2 s, 4 s.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Whether unexpected disconnects trigger automatic reconnection.
    pub enabled: bool,
    /// Attempts before giving up. 0 means automatic retry never fires.
    pub max_attempts: u32,
    /// First delay of the schedule, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectConfig {
    /// Largest accepted `max_attempts`.
    pub const MAX_ATTEMPTS: u32 = 16;

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `max_attempts` capped to [`Self::MAX_ATTEMPTS`].
    /// - `max_delay_ms` raised to at least `base_delay_ms`.
    pub fn validated(mut self) -> Self {
        if self.max_attempts > Self::MAX_ATTEMPTS {
            warn!(
                max_attempts = self.max_attempts,
                limit = Self::MAX_ATTEMPTS,
                "max_attempts exceeds limit, clamping"
            );
            self.max_attempts = Self::MAX_ATTEMPTS;
        }
        if self.max_delay_ms < self.base_delay_ms {
            self.max_delay_ms = self.base_delay_ms;
        }
        self
    }

    /// The schedule entry for `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = attempt.min(self.max_attempts.saturating_sub(1));
        let factor = 1u64.checked_shl(index).unwrap_or(u64::MAX);
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// Policy state
// ---------------------------------------------------------------------------

/// What the policy wants done after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStep {
    /// Keep waiting.
    Wait,
    /// Try to reconnect now. `delay` is the wait before the attempt after it.
    Attempt { attempt: u32, delay: Duration },
    /// The delay ran out with no attempts left.
    Exhausted,
}

/// Retry bookkeeping: `{ enabled, attempt, delay, max_attempts }` plus the
/// time left before the next attempt.
///
/// Invariant: `0 <= attempt <= max_attempts`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    enabled: bool,
    attempt: u32,
    delay: Duration,
    remaining: Duration,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        let config = config.validated();
        let delay = config.delay_for(0);
        Self {
            enabled: config.enabled,
            config,
            attempt: 0,
            delay,
            remaining: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Attempts made since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Current schedule delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time left before the next attempt fires.
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Whether every attempt has been used.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Arms the countdown for the current attempt index.
    pub fn arm(&mut self) {
        self.delay = self.config.delay_for(self.attempt);
        self.remaining = self.delay;
    }

    /// Back to `attempt = 0`. Called when a connection reaches the
    /// authenticated or resumed state.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.delay = self.config.delay_for(0);
        self.remaining = Duration::ZERO;
    }

    /// Restarts the schedule with no wait: the next tick attempts at once.
    pub fn retry_now(&mut self) {
        self.attempt = 0;
        self.delay = Duration::ZERO;
        self.remaining = Duration::ZERO;
    }

    /// Advances the countdown by `elapsed`.
    pub fn tick(&mut self, elapsed: Duration) -> ReconnectStep {
        self.remaining = self.remaining.saturating_sub(elapsed);
        if !self.remaining.is_zero() {
            return ReconnectStep::Wait;
        }
        if self.is_exhausted() {
            return ReconnectStep::Exhausted;
        }

        self.attempt += 1;
        self.delay = self.config.delay_for(self.attempt);
        self.remaining = self.delay;
        ReconnectStep::Attempt {
            attempt: self.attempt,
            delay: self.delay,
        }
    }
}
