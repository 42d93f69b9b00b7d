//! Worker configuration.
//!
//! Defaults are the reference values:
//! - visibility window 60s: upper bound on handler run time, so a slow but
//!   live worker is not duplicated
//! - long-poll wait 20s
//! - 5 deliveries before a failing job is abandoned

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Backoff, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// How long a claimed message stays hidden from other receivers.
    #[serde(with = "duration_secs")]
    pub visibility_timeout: Duration,

    /// How long a receive blocks waiting for a message.
    #[serde(with = "duration_secs")]
    pub wait_time: Duration,

    pub retry: RetryPolicy,

    /// Delay schedule after transport errors.
    pub backoff: Backoff,
}

impl WorkerConfig {
    pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(20);

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_wait_time(mut self, wait: Duration) -> Self {
        self.wait_time = wait;
        self
    }

    pub fn with_max_retry_attempts(mut self, max: u32) -> Self {
        self.retry = RetryPolicy::new(max);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Self::DEFAULT_VISIBILITY_TIMEOUT,
            wait_time: Self::DEFAULT_WAIT_TIME,
            retry: RetryPolicy::default(),
            backoff: Backoff::default(),
        }
    }
}

/// Serialize a `Duration` as (fractional) seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
