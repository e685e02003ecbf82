//! Reconnection Policy
//!
//! Exponential backoff with a ceiling and symmetric jitter for feed
//! reconnects. A multiplier of 1 with zero jitter gives a flat delay.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::WebSocketSettings;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Ceiling for the un-jittered delay.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Maximum consecutive attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &WebSocketSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: settings.reconnect_jitter,
            max_attempts: settings.max_reconnect_attempts,
        }
    }

    /// Largest delay the policy can ever return.
    #[must_use]
    pub fn upper_bound(&self) -> Duration {
        self.max_delay.mul_f64(1.0 + self.jitter_factor.max(0.0))
    }
}

/// Backoff state for one connection supervisor.
///
/// Attempts count consecutive failures; [`reset`](Self::reset) is called once
/// a connection proves healthy.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt, or `None` once `max_attempts` is spent.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempt_count += 1;

        let delay = self.apply_jitter(self.current_delay);
        #[allow(clippy::cast_precision_loss)]
        let grown = (self.current_delay.as_millis() as f64 * self.config.multiplier.max(1.0)).round();
        self.current_delay = millis_to_duration(grown)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay);

        Some(delay)
    }

    /// Reset after a healthy connection.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Consecutive attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || duration.is_zero() {
            return duration;
        }

        let factor = rand::rng()
            .random_range(-self.config.jitter_factor..=self.config.jitter_factor);
        #[allow(clippy::cast_precision_loss)]
        let adjusted = (duration.as_millis() as f64 * (1.0 + factor)).max(1.0);
        millis_to_duration(adjusted).unwrap_or(duration)
    }
}

/// `None` for non-finite or out-of-range values.
fn millis_to_duration(millis: f64) -> Option<Duration> {
    #[allow(clippy::cast_precision_loss)]
    let in_range = millis.is_finite() && millis >= 0.0 && millis <= u64::MAX as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = millis as u64;
    in_range.then(|| Duration::from_millis(whole))
}
