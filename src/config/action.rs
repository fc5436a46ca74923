use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActionConfig {
    /// Maximum wait for the action lock (ms), 0 waits indefinitely
    #[serde(default = "default_lock_timeout_in_ms")]
    pub lock_timeout_in_ms: u64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            lock_timeout_in_ms: default_lock_timeout_in_ms(),
        }
    }
}

impl ActionConfig {
    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_in_ms > 0).then(|| Duration::from_millis(self.lock_timeout_in_ms))
    }

    pub fn validate(&self) -> Result<()> {
        // one hour is far beyond any action we run
        if self.lock_timeout_in_ms > 3_600_000 {
            return Err(Error::Config(ConfigError::Message(format!(
                "action.lock_timeout_in_ms {} exceeds one hour",
                self.lock_timeout_in_ms
            ))));
        }
        Ok(())
    }
}

fn default_lock_timeout_in_ms() -> u64 {
    30_000
}
