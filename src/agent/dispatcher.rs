//! State-Change Dispatcher.
//!
//! Runs the single registered callback with the previous record and a
//! snapshot of the current one. Invocations are serialized; the snapshot is
//! taken from the state store at the moment of the call.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::state::TabletState;
use crate::services::StateChangeCallback;
use crate::topo::Tablet;
use crate::AgentError;
use crate::Result;

pub struct StateChangeDispatcher {
    callback: Arc<dyn StateChangeCallback>,
    dispatch_lock: Mutex<()>,
}

impl std::fmt::Debug for StateChangeDispatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("StateChangeDispatcher").finish()
    }
}

impl StateChangeDispatcher {
    pub fn new(callback: Arc<dyn StateChangeCallback>) -> Self {
        Self {
            callback,
            dispatch_lock: Mutex::new(()),
        }
    }

    /// Invokes the callback comparing `old_tablet` with the currently cached record.
    pub async fn update_state(
        &self,
        state: &TabletState,
        old_tablet: &Tablet,
        reason: &str,
    ) -> Result<()> {
        let _dispatch = self.dispatch_lock.lock().await;

        let new_tablet = state.tablet().ok_or(AgentError::NotInitialized)?;

        info!(alias = %new_tablet.alias, %reason, "Running tablet callback because: {}", reason);
        if let Err(e) = self.callback.on_state_change(state, old_tablet, &new_tablet).await {
            warn!(alias = %new_tablet.alias, %reason, error = %e, "state change callback failed");
            return Err(e);
        }
        debug!(alias = %new_tablet.alias, "state change callback completed");
        Ok(())
    }
}
