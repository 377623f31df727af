//! Gateway configuration, read from `KITCHEN_*` environment variables.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kitchen_feed::FeedConfig;
use thiserror::Error;

use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    /// Allowed browser origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// JSON catalog seed; the built-in demo catalog is used when unset.
    pub catalog_file: Option<PathBuf>,
    /// Order placement, per store.
    pub order_rate: RateLimitConfig,
    /// Display connection attempts, service-wide.
    pub ws_rate: RateLimitConfig,
    pub feed: FeedConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_origins: vec!["http://localhost:3000".to_string()],
            catalog_file: None,
            order_rate: RateLimitConfig::new(20, 20.0),
            ws_rate: RateLimitConfig::new(10, 10.0),
            feed: FeedConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cors_origins = match lookup("KITCHEN_CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty() && *o != "*")
                .map(str::to_string)
                .collect(),
            None => defaults.cors_origins,
        };

        let catalog_file = lookup("KITCHEN_CATALOG_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let feed = FeedConfig {
            outbound_capacity: parse_var(
                &lookup,
                "KITCHEN_OUTBOUND_CAPACITY",
                defaults.feed.outbound_capacity,
            )?,
            send_timeout: parse_millis(&lookup, "KITCHEN_SEND_TIMEOUT_MS", defaults.feed.send_timeout)?,
            heartbeat_interval: parse_millis(
                &lookup,
                "KITCHEN_HEARTBEAT_INTERVAL_MS",
                defaults.feed.heartbeat_interval,
            )?,
            max_missed_heartbeats: parse_var(
                &lookup,
                "KITCHEN_MAX_MISSED_HEARTBEATS",
                defaults.feed.max_missed_heartbeats,
            )?,
            handshake_timeout: parse_millis(
                &lookup,
                "KITCHEN_HANDSHAKE_TIMEOUT_MS",
                defaults.feed.handshake_timeout,
            )?,
        };

        if feed.outbound_capacity == 0 {
            return Err(invalid("KITCHEN_OUTBOUND_CAPACITY", "0", "must be at least 1"));
        }
        if feed.max_missed_heartbeats == 0 {
            return Err(invalid("KITCHEN_MAX_MISSED_HEARTBEATS", "0", "must be at least 1"));
        }

        Ok(Self {
            bind_addr: parse_var(&lookup, "KITCHEN_BIND_ADDR", defaults.bind_addr)?,
            cors_origins,
            catalog_file,
            order_rate: parse_rate(
                &lookup,
                ("KITCHEN_ORDER_RATE_CAPACITY", "KITCHEN_ORDER_RATE_REFILL"),
                defaults.order_rate,
            )?,
            ws_rate: parse_rate(
                &lookup,
                ("KITCHEN_WS_RATE_CAPACITY", "KITCHEN_WS_RATE_REFILL"),
                defaults.ws_rate,
            )?,
            feed,
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(key, &raw, e)),
        None => Ok(default),
    }
}

fn parse_millis<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    let ms: u64 = parse_var(lookup, key, default_ms)?;
    if ms == 0 {
        return Err(invalid(key, "0", "must be a positive number of milliseconds"));
    }
    Ok(Duration::from_millis(ms))
}

fn parse_rate<F>(
    lookup: &F,
    (capacity_key, refill_key): (&'static str, &'static str),
    default: RateLimitConfig,
) -> Result<RateLimitConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let capacity: u32 = parse_var(lookup, capacity_key, default.capacity)?;
    if capacity == 0 {
        return Err(invalid(capacity_key, "0", "must be at least 1"));
    }
    let refill: f64 = parse_var(lookup, refill_key, default.refill_per_sec)?;
    if !refill.is_finite() || refill < 0.0 {
        return Err(invalid(
            refill_key,
            &refill.to_string(),
            "must be a finite, non-negative rate",
        ));
    }
    Ok(RateLimitConfig::new(capacity, refill))
}
