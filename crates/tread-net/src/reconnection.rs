//! Exponential-backoff reconnection policy.
//!
//! After an abnormal close the connection manager asks [`ReconnectPolicy`]
//! for the next delay. Delays double from `base_delay` and stop after
//! `max_attempts`. The attempt counter only resets when a socket actually
//! opens. The pending attempt is stored on the manager as a
//! [`ScheduledReconnect`] so it can be inspected or cancelled.

use std::time::Duration;

/// Configuration for client-side reconnection behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first attempt. Default: 1 s.
    pub base_delay: Duration,
    /// Attempts before giving up. Default: 5.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

/// Tracks the attempt count and computes the next backoff delay.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Advance the attempt counter and return the delay for that attempt:
    /// `base_delay * 2^(attempt - 1)`.
    /// Returns `None` once max attempts have been used.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;
        let factor = 1u32.checked_shl(self.attempts - 1).unwrap_or(u32::MAX);
        Some(self.config.base_delay.saturating_mul(factor))
    }

    /// Forget past attempts (called when a socket opens).
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts made since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }
}

/// A reconnection attempt waiting for its due time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReconnect {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Clock time (ms) at which the attempt fires.
    pub due_at_ms: u64,
    /// URL the attempt reconnects to.
    pub url: String,
}

impl ScheduledReconnect {
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.due_at_ms
    }
}
