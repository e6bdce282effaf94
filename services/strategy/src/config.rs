//! Service configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::momentum::MomentumConfig;

/// Runtime configuration for the strategy service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub nats_url: String,
    pub jwt_secret: String,
    pub momentum: MomentumConfig,
    /// VWAP trade window capacity per symbol.
    pub vwap_window: usize,
    /// TWAP price window capacity per symbol.
    pub twap_window: usize,
    /// Bus-level timeout applied by callers issuing requests.
    pub request_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let defaults = MomentumConfig::default();
        Self {
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                "your-super-secret-jwt-key-change-in-production-minimum-32-chars".to_string()
            }),
            momentum: MomentumConfig {
                lookback_period: env_parse("MOMENTUM_LOOKBACK_PERIOD", defaults.lookback_period),
                entry_threshold: env_parse("MOMENTUM_ENTRY_THRESHOLD", defaults.entry_threshold),
                exit_threshold: env_parse("MOMENTUM_EXIT_THRESHOLD", defaults.exit_threshold),
            },
            vwap_window: env_parse("VWAP_WINDOW_SIZE", 100),
            twap_window: env_parse("TWAP_WINDOW_SIZE", 100),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", 5)),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            jwt_secret: String::new(),
            momentum: MomentumConfig::default(),
            vwap_window: 100,
            twap_window: 100,
            request_timeout: Duration::from_secs(5),
        }
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
