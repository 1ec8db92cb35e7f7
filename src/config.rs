//! Environment-driven configuration with code defaults.

use std::time::Duration;

use crate::client::SWAPI_API_BASE;
use crate::engine::PaginationPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Base address of the upstream API.
    pub upstream_base: String,
    /// Concurrent fetches per pagination batch.
    pub batch_width: u64,
    /// Cumulative misses before the people run stops.
    pub people_miss_threshold: u32,
    /// Cumulative misses before the planets run stops.
    pub planets_miss_threshold: u32,
    /// Ceiling on batches per run.
    pub max_batches: u32,
    /// Attempts per cursor position for failed batches.
    pub batch_retries: u32,
    /// Base backoff between batch retries.
    pub retry_backoff: Duration,
    /// Per-request timeout on upstream fetches.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            upstream_base: SWAPI_API_BASE.to_string(),
            batch_width: 10,
            people_miss_threshold: 5,
            planets_miss_threshold: 3,
            max_batches: 100,
            batch_retries: 3,
            retry_backoff: Duration::from_millis(250),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            port: env_parsed("PORT", defaults.port),
            upstream_base: std::env::var("SWAPI_BASE_URL").unwrap_or(defaults.upstream_base),
            batch_width: env_parsed("BATCH_WIDTH", defaults.batch_width),
            people_miss_threshold: env_parsed(
                "PEOPLE_MISS_THRESHOLD",
                defaults.people_miss_threshold,
            ),
            planets_miss_threshold: env_parsed(
                "PLANETS_MISS_THRESHOLD",
                defaults.planets_miss_threshold,
            ),
            max_batches: env_parsed("MAX_BATCHES", defaults.max_batches),
            batch_retries: env_parsed("BATCH_RETRIES", defaults.batch_retries),
            retry_backoff: Duration::from_millis(env_parsed("RETRY_BACKOFF_MS", 250)),
            request_timeout: Duration::from_secs(env_parsed("REQUEST_TIMEOUT_SECS", 30)),
        }
    }

    pub fn people_policy(&self) -> PaginationPolicy {
        self.policy(self.people_miss_threshold)
    }

    pub fn planets_policy(&self) -> PaginationPolicy {
        self.policy(self.planets_miss_threshold)
    }

    fn policy(&self, miss_threshold: u32) -> PaginationPolicy {
        PaginationPolicy {
            batch_width: self.batch_width,
            miss_threshold,
            max_batches: self.max_batches,
            batch_retries: self.batch_retries,
            retry_backoff: self.retry_backoff,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
