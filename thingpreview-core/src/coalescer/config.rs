//! Configuration for the request coalescer.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// Background re-fetch of keys whose domain lookup failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before each re-fetch attempt
    pub backoff: Duration,
    /// Maximum number of re-fetch attempts per failed lookup
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { backoff: Duration::from_secs(2), max_attempts: 3 }
    }
}

/// Configuration for the request coalescer
#[derive(Debug, Clone, PartialEq)]
pub struct CoalescerConfig {
    /// Quiescence window: a batch is flushed only after this much time passes
    /// without a new request
    pub debounce_window: Duration,

    /// Re-fetch policy for failed domain lookups. Callers waiting on a failed
    /// flush still receive `None`; a successful re-fetch only warms the cache
    /// for later requests. `None` disables re-fetching.
    pub retry: Option<RetryPolicy>,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(100),
            retry: None,
        }
    }
}

impl CoalescerConfig {
    /// Short window for interactive pages with few placeholders
    pub fn low_latency() -> Self {
        Self { debounce_window: Duration::from_millis(20), retry: None }
    }

    /// Longer window that collects more keys per batch, with re-fetching
    pub fn high_throughput() -> Self {
        Self {
            debounce_window: Duration::from_millis(250),
            retry: Some(RetryPolicy::default()),
        }
    }

    /// Create config from environment variables, ignoring invalid values
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok(), skip_invalid).unwrap_or_default()
    }

    /// Like [`from_env`](Self::from_env), but reports invalid values
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok(), Err)
    }

    /// Build a config from `THINGPREVIEW_*` values. `on_invalid` decides
    /// whether a bad value aborts (`Err`) or is skipped (`Ok`).
    fn from_lookup(
        get: impl Fn(&str) -> Option<String>,
        mut on_invalid: impl FnMut(ConfigError) -> Result<(), ConfigError>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&get, "THINGPREVIEW_DEBOUNCE_MS", &mut on_invalid)? {
            if ms == 0 {
                on_invalid(ConfigError::ZeroWindow)?;
            } else {
                config.debounce_window = Duration::from_millis(ms);
            }
        }

        if let Some(ms) = parse_var::<u64>(&get, "THINGPREVIEW_RETRY_BACKOFF_MS", &mut on_invalid)? {
            config.retry.get_or_insert_with(RetryPolicy::default).backoff = Duration::from_millis(ms);
        }

        if let Some(n) = parse_var::<u32>(&get, "THINGPREVIEW_RETRY_ATTEMPTS", &mut on_invalid)? {
            if n == 0 {
                config.retry = None;
            } else {
                config.retry.get_or_insert_with(RetryPolicy::default).max_attempts = n;
            }
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &str,
    on_invalid: &mut impl FnMut(ConfigError) -> Result<(), ConfigError>,
) -> Result<Option<T>, ConfigError> {
    let Some(val) = get(var) else {
        return Ok(None);
    };
    match val.parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => on_invalid(ConfigError::invalid(var, &val)).map(|()| None),
    }
}

fn skip_invalid(err: ConfigError) -> Result<(), ConfigError> {
    warn!(error = %err, "Ignoring invalid coalescer setting");
    Ok(())
}
