//! Health-check driver.
//!
//! One check asks the reporter, stores the outcome in the state store,
//! appends it to the history ring and broadcasts it. Checks are serialized,
//! so subscribers see replies in the order the checks ran.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::ActionAgent;
use super::HealthRecord;
use super::HealthStreamReply;
use crate::metrics::REPLICATION_DELAY_SECONDS;
use crate::utils::time::get_now_as_millis;
use crate::AgentError;
use crate::HealthError;
use crate::Result;

impl ActionAgent {
    /// Runs one health check and returns the reply that was broadcast.
    pub async fn run_health_check(&self) -> Result<HealthStreamReply> {
        self.ensure_running("health check")?;
        let _check = self.health_check_lock.lock().await;

        let tablet = self.state.tablet().ok_or(AgentError::NotInitialized)?;
        let should_query_service_be_running = self.state.accepting_queries();

        let report = self
            .health_reporter
            .report(tablet.tablet_type, should_query_service_be_running)
            .await;
        let health_error = report.error.map(HealthError::Unhealthy);
        if let Some(e) = &health_error {
            warn!(alias = %self.alias, error = %e, "health check reported unhealthy");
        }

        self.state.set_health(report.replication_delay, health_error.clone());
        REPLICATION_DELAY_SECONDS.set(report.replication_delay.as_secs_f64());

        self.history.add(HealthRecord {
            time: get_now_as_millis(),
            tablet_type: tablet.tablet_type,
            replication_delay: report.replication_delay,
            error: health_error.clone(),
        });

        let reply = HealthStreamReply {
            tablet,
            replication_delay: report.replication_delay,
            health_error,
        };
        let delivered = self.health_stream.broadcast(reply.clone());
        trace!(delivered, delay = ?reply.replication_delay, "health check broadcast");
        Ok(reply)
    }

    /// Spawns the periodic health check; `None` when no interval is configured.
    ///
    /// The loop exits when the batch token is cancelled or the agent is dropped.
    pub fn spawn_health_check_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.config.health.check_interval()?;
        let agent = Arc::downgrade(self);
        let token = self.batch_token.child_token();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("health check loop stopped");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                let Some(agent) = agent.upgrade() else {
                    return;
                };
                if let Err(e) = agent.run_health_check().await {
                    warn!(alias = %agent.alias, error = %e, "health check failed to run");
                }
            }
        }))
    }
}
