//! Backoff for the subscription socket
//!
//! Exponential delay between reconnect attempts, capped at `max_delay`
//! and jittered by `jitter_factor`.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first attempt after a drop.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Growth factor applied after each attempt.
    pub multiplier: f64,
    /// Fraction of the delay randomized either way (0.1 = ±10%).
    pub jitter_factor: f64,
    /// 0 means retry forever.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(64),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

/// Tracks attempts since the last successful connect.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt, or `None` once the attempt
    /// budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;

        let delay = self.jittered(self.current_delay);
        let grown = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let cap = self.config.max_delay.as_millis() as f64;
        self.current_delay = if grown.is_finite() && grown > 0.0 {
            Duration::from_millis(grown.min(cap) as u64)
        } else {
            self.config.max_delay
        };
        Some(delay)
    }

    /// Call after a successful connect.
    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempts = 0;
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return base;
        }
        let millis = base.as_millis() as f64;
        let spread = millis * self.config.jitter_factor;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis((millis + offset).max(1.0) as u64)
    }
}
