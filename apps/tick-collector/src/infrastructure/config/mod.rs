//! Configuration Module
//!
//! Configuration loading for the collector service.

mod settings;

pub use settings::{
    CollectorConfig, ConfigError, DEFAULT_FEED_URL, DatabaseSettings, FeedSettings,
    ServerSettings, WebSocketSettings,
};
