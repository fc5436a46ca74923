use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthConfig {
    /// Capacity of each subscriber's health stream channel.
    /// Replies beyond this are dropped for that subscriber.
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,

    /// Number of past health checks kept for status pages
    #[serde(default = "default_history_length")]
    pub history_length: usize,

    /// Interval between background health checks (ms), 0 disables the loop
    #[serde(default = "default_check_interval_in_ms")]
    pub check_interval_in_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            stream_buffer_size: default_stream_buffer_size(),
            history_length: default_history_length(),
            check_interval_in_ms: default_check_interval_in_ms(),
        }
    }
}

impl HealthConfig {
    pub fn check_interval(&self) -> Option<Duration> {
        (self.check_interval_in_ms > 0).then(|| Duration::from_millis(self.check_interval_in_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "health.stream_buffer_size must be at least 1".into(),
            )));
        }

        if self.history_length == 0 {
            return Err(Error::Config(ConfigError::Message(
                "health.history_length must be at least 1".into(),
            )));
        }

        Ok(())
    }
}

fn default_stream_buffer_size() -> usize {
    10
}
fn default_history_length() -> usize {
    16
}
// in ms
fn default_check_interval_in_ms() -> u64 {
    20_000
}
