//! Reconnect Configuration
//!
//! How the resilient transport schedules reconnect attempts after an
//! unexpected close.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of reconnect attempts after an unexpected close
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay between reconnect attempts
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default ceiling for exponential backoff
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Delay schedule between reconnect attempts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// `attempt * base`
    #[default]
    Linear,
    /// `base * 2^(attempt - 1)`, capped at `max_delay_ms`
    Exponential,
    /// Always `base`
    Fixed,
}

impl FromStr for BackoffPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "exponential" | "exp" => Ok(Self::Exponential),
            "fixed" | "constant" => Ok(Self::Fixed),
            other => Err(format!(
                "unknown backoff policy '{other}' (expected linear, exponential or fixed)"
            )),
        }
    }
}

impl fmt::Display for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Exponential => write!(f, "exponential"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

/// Reconnect policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Reconnect attempts after an unexpected close (0 = never reconnect)
    pub max_attempts: u32,

    /// Base delay in milliseconds; must be greater than zero
    pub base_delay_ms: u64,

    /// Delay schedule
    pub backoff: BackoffPolicy,

    /// Upper bound for exponential backoff in milliseconds
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            backoff: BackoffPolicy::default(),
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given 1-based reconnect attempt
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let ms = match self.backoff {
            BackoffPolicy::Linear => self.base_delay_ms.saturating_mul(u64::from(attempt)),
            BackoffPolicy::Exponential => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                self.base_delay_ms
                    .saturating_mul(factor)
                    .min(self.max_delay_ms.max(self.base_delay_ms))
            }
            BackoffPolicy::Fixed => self.base_delay_ms,
        };
        Duration::from_millis(ms)
    }

    /// Check the invariants the transport relies on
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms == 0 {
            return Err("reconnect base_delay_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}
