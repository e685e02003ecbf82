//! Collector Configuration Settings
//!
//! Configuration types for the tick collector, loaded from environment
//! variables. Every variable is optional; unset variables take the defaults
//! below, but a variable that is set must parse.

use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::PipelineSettings;

/// Default feed endpoint.
pub const DEFAULT_FEED_URL: &str = "wss://ws-feed.exchange.coinbase.com";

/// Feed subscription settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Channel name.
    pub channel: String,
    /// Product identifier in `BASE-QUOTE` form.
    pub product_id: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            channel: "matches".to_string(),
            product_id: "ETH-USDT".to_string(),
        }
    }
}

/// Trade store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// SQLite database file.
    pub path: PathBuf,
    /// How long a statement waits on a locked database.
    pub busy_timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("coinbase_ethusdt.db"),
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Silence before the connection is considered dead.
    pub heartbeat_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Jitter as a fraction of the delay.
    pub reconnect_jitter: f64,
    /// Maximum consecutive reconnection attempts (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            reconnect_delay_initial: Duration::from_millis(1_000),
            reconnect_delay_max: Duration::from_secs(60),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.1,
            max_reconnect_attempts: 0,
        }
    }
}

/// Process-level settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
    /// Budget for a graceful shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            metrics_port: 0,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Complete collector configuration.
#[derive(Debug, Clone, Default)]
pub struct CollectorConfig {
    /// Feed subscription.
    pub feed: FeedSettings,
    /// Trade store.
    pub database: DatabaseSettings,
    /// WebSocket connection behavior.
    pub websocket: WebSocketSettings,
    /// Ingestion queue.
    pub pipeline: PipelineSettings,
    /// Process settings.
    pub server: ServerSettings,
}

impl CollectorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but empty or invalid, or the
    /// combination of values is inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let feed_defaults = FeedSettings::default();
        let feed = FeedSettings {
            url: env.string("FEED_URL", &feed_defaults.url)?,
            channel: env.string("FEED_CHANNEL", &feed_defaults.channel)?,
            product_id: env.string("FEED_PRODUCT_ID", &feed_defaults.product_id)?,
        };

        let db_defaults = DatabaseSettings::default();
        let database = DatabaseSettings {
            path: PathBuf::from(env.string("TICK_DB_PATH", &db_defaults.path.to_string_lossy())?),
            busy_timeout: env.millis("TICK_DB_BUSY_TIMEOUT_MS", db_defaults.busy_timeout)?,
        };

        let ws_defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            heartbeat_interval: env.secs(
                "TICK_COLLECTOR_HEARTBEAT_INTERVAL_SECS",
                ws_defaults.heartbeat_interval,
            )?,
            heartbeat_timeout: env.secs(
                "TICK_COLLECTOR_HEARTBEAT_TIMEOUT_SECS",
                ws_defaults.heartbeat_timeout,
            )?,
            reconnect_delay_initial: env.millis(
                "TICK_COLLECTOR_RECONNECT_DELAY_INITIAL_MS",
                ws_defaults.reconnect_delay_initial,
            )?,
            reconnect_delay_max: env.secs(
                "TICK_COLLECTOR_RECONNECT_DELAY_MAX_SECS",
                ws_defaults.reconnect_delay_max,
            )?,
            reconnect_delay_multiplier: env.parse(
                "TICK_COLLECTOR_RECONNECT_DELAY_MULTIPLIER",
                ws_defaults.reconnect_delay_multiplier,
            )?,
            reconnect_jitter: env.parse(
                "TICK_COLLECTOR_RECONNECT_JITTER",
                ws_defaults.reconnect_jitter,
            )?,
            max_reconnect_attempts: env.parse(
                "TICK_COLLECTOR_MAX_RECONNECT_ATTEMPTS",
                ws_defaults.max_reconnect_attempts,
            )?,
        };

        let pipeline_defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            buffer_capacity: env.parse(
                "TICK_COLLECTOR_BUFFER_CAPACITY",
                pipeline_defaults.buffer_capacity,
            )?,
            enqueue_timeout: env.millis(
                "TICK_COLLECTOR_ENQUEUE_TIMEOUT_MS",
                pipeline_defaults.enqueue_timeout,
            )?,
        };

        let server_defaults = ServerSettings::default();
        let server = ServerSettings {
            metrics_port: env.parse("TICK_COLLECTOR_METRICS_PORT", server_defaults.metrics_port)?,
            shutdown_timeout: env.secs(
                "TICK_COLLECTOR_SHUTDOWN_TIMEOUT_SECS",
                server_defaults.shutdown_timeout,
            )?,
        };

        let config = Self {
            feed,
            database,
            websocket,
            pipeline,
            server,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.feed.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::invalid(
                "FEED_URL",
                url,
                "must start with ws:// or wss://",
            ));
        }

        let product = &self.feed.product_id;
        let well_formed = product
            .split_once('-')
            .is_some_and(|(base, quote)| is_asset_code(base) && is_asset_code(quote));
        if !well_formed {
            return Err(ConfigError::invalid(
                "FEED_PRODUCT_ID",
                product,
                "expected BASE-QUOTE, e.g. ETH-USDT",
            ));
        }

        if self.pipeline.buffer_capacity == 0 {
            return Err(ConfigError::invalid(
                "TICK_COLLECTOR_BUFFER_CAPACITY",
                "0",
                "must be at least 1",
            ));
        }

        let ws = &self.websocket;
        if ws.reconnect_delay_max < ws.reconnect_delay_initial {
            return Err(ConfigError::invalid(
                "TICK_COLLECTOR_RECONNECT_DELAY_MAX_SECS",
                &format!("{:?}", ws.reconnect_delay_max),
                "must not be below the initial delay",
            ));
        }
        if !(ws.reconnect_delay_multiplier >= 1.0 && ws.reconnect_delay_multiplier.is_finite()) {
            return Err(ConfigError::invalid(
                "TICK_COLLECTOR_RECONNECT_DELAY_MULTIPLIER",
                &ws.reconnect_delay_multiplier.to_string(),
                "must be a finite number >= 1",
            ));
        }
        if !(0.0..=1.0).contains(&ws.reconnect_jitter) {
            return Err(ConfigError::invalid(
                "TICK_COLLECTOR_RECONNECT_JITTER",
                &ws.reconnect_jitter.to_string(),
                "must be between 0 and 1",
            ));
        }
        if ws.heartbeat_interval.is_zero() || ws.heartbeat_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "TICK_COLLECTOR_HEARTBEAT_INTERVAL_SECS",
                "0",
                "heartbeat interval and timeout must be positive",
            ));
        }

        Ok(())
    }
}

fn is_asset_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable is set but empty.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),

    /// Environment variable does not hold an acceptable value.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Lookup helpers
// =============================================================================

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match (self.lookup)(key) {
            None => Ok(None),
            Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
            Some(value) => Ok(Some(value.trim().to_string())),
        }
    }

    fn string(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        Ok(self.raw(key)?.unwrap_or_else(|| default.to_string()))
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(key)? {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, &value, e.to_string())),
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_secs()).map(Duration::from_secs)
    }

    fn millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let default = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parse(key, default).map(Duration::from_millis)
    }
}
