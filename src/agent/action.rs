//! Action lock.
//!
//! Every mutating entry point acquires an [`ActionGuard`] before touching the
//! topology store or the state store. Functions that must only run under the
//! action lock take `&ActionGuard` as a parameter, so the lock order is
//! enforced by their signatures rather than by call-site discipline.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tracing::debug;
use tracing::warn;

use crate::AgentError;
use crate::Result;

#[derive(Debug)]
pub struct ActionLock {
    mutex: Mutex<()>,
    timeout: Option<Duration>,
}

/// Proof that the action lock is held; released on drop.
#[derive(Debug)]
pub struct ActionGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    name: String,
}

impl ActionGuard<'_> {
    /// Name of the action holding the lock.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ActionLock {
    /// `timeout` of `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            mutex: Mutex::new(()),
            timeout,
        }
    }

    pub async fn acquire(
        &self,
        name: &str,
    ) -> Result<ActionGuard<'_>> {
        let guard = match self.timeout {
            None => self.mutex.lock().await,
            Some(timeout) => match tokio::time::timeout(timeout, self.mutex.lock()).await {
                Ok(guard) => guard,
                Err(_) => {
                    warn!(action = %name, ?timeout, "action lock not acquired in time");
                    return Err(AgentError::ActionLockTimeout(timeout).into());
                }
            },
        };
        debug!(action = %name, "action lock acquired");
        Ok(ActionGuard {
            _guard: guard,
            name: name.to_string(),
        })
    }

    /// Non-waiting check used by diagnostics.
    pub fn is_locked(&self) -> bool {
        self.mutex.try_lock().is_err()
    }
}
