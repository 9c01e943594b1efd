use chrono::TimeDelta;
use std::time::Duration;

use crate::error::ConfigError;

/// Lifetime of a session, counted from upload.
pub const DEFAULT_TTL_SECS: i64 = 600;

/// Longest TTL accepted. Keeps `created_at + ttl` far from chrono's range limit.
pub const MAX_TTL_SECS: u64 = 24 * 60 * 60;

/// How often the sweeper scans for expired sessions.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Longest PIN accepted at creation time, in bytes.
pub const DEFAULT_MAX_PIN_LEN: usize = 32;

/// Collision retries before `create` gives up with a capacity error.
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 64;

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub ttl: TimeDelta,
    pub max_pin_len: usize,
    pub max_code_attempts: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: TimeDelta::seconds(DEFAULT_TTL_SECS),
            max_pin_len: DEFAULT_MAX_PIN_LEN,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }
}

impl RegistryConfig {
    pub fn with_ttl_secs(mut self, secs: u64) -> Result<Self, ConfigError> {
        self.ttl = i64::try_from(secs)
            .ok()
            .filter(|_| (1..=MAX_TTL_SECS).contains(&secs))
            .and_then(TimeDelta::try_seconds)
            .ok_or(ConfigError::TtlOutOfRange {
                secs,
                max: MAX_TTL_SECS,
            })?;
        Ok(self)
    }
}
