//! The tablet agent and its lifecycle.
//!
//! An [`ActionAgent`] is an explicitly shared handle (`Arc<ActionAgent>`):
//! every collaborator is handed to it at construction by [`AgentBuilder`],
//! nothing is looked up globally.

mod action;
mod builder;
mod dispatcher;
mod health_check;
mod health_stream;
mod history;
mod state;
mod topo_sync;

pub use action::*;
pub use builder::*;
pub use dispatcher::*;
pub use health_stream::*;
pub use history::*;
pub use state::*;

#[cfg(test)]
mod dispatcher_test;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::config::AgentConfig;
use crate::metrics::TARGET_TABLET_TYPE;
use crate::mysqld::MysqlDaemon;
use crate::services::BinlogPlayerMap;
use crate::services::HealthReporter;
use crate::services::QueryServiceControl;
use crate::topo::Tablet;
use crate::topo::TabletAlias;
use crate::topo::TabletControl;
use crate::topo::TopoServer;
use crate::utils::net::HostResolver;
use crate::AgentError;
use crate::HealthError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Starting,
    Running,
    Stopped,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Starting => "starting",
            Lifecycle::Running => "running",
            Lifecycle::Stopped => "stopped",
        }
    }
}

/// Control-plane agent for one tablet.
pub struct ActionAgent {
    alias: TabletAlias,
    config: AgentConfig,

    topo: Arc<dyn TopoServer>,
    mysqld: Arc<dyn MysqlDaemon>,
    resolver: Arc<dyn HostResolver>,
    query_service: Arc<dyn QueryServiceControl>,
    binlog_players: Arc<dyn BinlogPlayerMap>,
    health_reporter: Arc<dyn HealthReporter>,

    state: TabletState,
    dispatcher: StateChangeDispatcher,
    health_stream: HealthStreamBroadcaster,
    history: HealthHistory,
    action_lock: ActionLock,
    /// Serializes report -> store -> history -> broadcast
    health_check_lock: tokio::sync::Mutex<()>,

    lifecycle: Mutex<Lifecycle>,
    /// Long-lived context for background work, never tied to a request
    batch_token: CancellationToken,
    health_loop: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ActionAgent {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ActionAgent")
            .field("alias", &self.alias)
            .field("lifecycle", &*self.lifecycle.lock())
            .finish()
    }
}

impl ActionAgent {
    pub fn alias(&self) -> &TabletAlias {
        &self.alias
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    /// Cached tablet record, `None` before the first successful read.
    pub fn tablet(&self) -> Option<Tablet> {
        self.state.tablet()
    }

    /// Latest replication delay and health outcome.
    pub fn healthy(&self) -> (Duration, std::result::Result<(), HealthError>) {
        self.state.healthy()
    }

    pub fn blacklisted_tables(&self) -> Vec<String> {
        self.state.blacklisted_tables()
    }

    pub fn disable_query_service(&self) -> bool {
        self.state.disable_query_service()
    }

    /// Installs control overrides outside a transition. On transitions the
    /// state-change callback refreshes them.
    pub fn set_tablet_control(
        &self,
        tablet_control: Option<TabletControl>,
    ) {
        self.state.set_tablet_control(tablet_control);
    }

    pub fn accepting_queries(&self) -> bool {
        self.state.accepting_queries()
    }

    pub fn subscribe_health(&self) -> Subscription {
        self.health_stream.subscribe()
    }

    pub fn register_health_stream(
        &self,
        sender: tokio::sync::mpsc::Sender<Arc<HealthStreamReply>>,
    ) -> u64 {
        self.health_stream.register(sender)
    }

    pub fn unsubscribe_health(
        &self,
        id: u64,
    ) -> bool {
        self.health_stream.unsubscribe(id)
    }

    pub fn broadcast_health_stream_reply(
        &self,
        reply: HealthStreamReply,
    ) -> usize {
        self.health_stream.broadcast(reply)
    }

    /// Number of health stream subscribers.
    pub fn health_stream_map_size(&self) -> usize {
        self.health_stream.size()
    }

    /// Past health checks, oldest first.
    pub fn health_history(&self) -> Vec<HealthRecord> {
        self.history.records()
    }

    /// Extra environment passed to hooks run on behalf of this tablet.
    pub fn hook_extra_env(&self) -> HashMap<String, String> {
        HashMap::from([("TABLET_ALIAS".to_string(), self.alias.to_string())])
    }

    /// Token cancelled when the agent stops.
    pub fn batch_token(&self) -> CancellationToken {
        self.batch_token.clone()
    }

    /// Context for the finalize phase of a reparent.
    ///
    /// Cancelled only when the agent stops, never by the request that started it.
    pub fn finalize_reparent_token(&self) -> CancellationToken {
        self.batch_token.child_token()
    }

    /// Runs `work` detached from the caller; it is aborted when the agent stops.
    pub fn spawn_background<F>(
        &self,
        name: &str,
        work: F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.batch_token.child_token();
        let name = name.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(task = %name, "background task cancelled");
                }
                _ = work => {
                    debug!(task = %name, "background task finished");
                }
            }
        })
    }

    /// Runs a mutating action under the action lock, then refreshes the tablet.
    ///
    /// The refresh only happens when `action` succeeds.
    pub async fn run_action<F, Fut, T>(
        &self,
        name: &str,
        action: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.ensure_running(name)?;
        let guard = self.action_lock.acquire(name).await?;
        let out = action().await?;
        self.refresh_tablet(&guard, name).await?;
        Ok(out)
    }

    /// Re-reads the tablet and dispatches the state change, with `reason` for diagnostics.
    pub async fn refresh(
        &self,
        reason: &str,
    ) -> Result<()> {
        self.run_action(reason, || async { Ok(()) }).await
    }

    /// Registers the tablet in the topology store and brings it to `Running`.
    ///
    /// Reading or registering the record is fatal: the agent is left
    /// `Stopped` and the error returned. Consistency-check, endpoint and
    /// initial dispatch failures are logged and startup continues.
    #[instrument(skip(self), fields(alias = %self.alias))]
    pub async fn start(
        self: &Arc<Self>,
        mysql_port: u16,
        vt_port: u16,
        vts_port: u16,
    ) -> Result<()> {
        self.transition(Lifecycle::Uninitialized, Lifecycle::Starting)?;

        if let Err(e) = self.start_locked(mysql_port, vt_port, vts_port).await {
            error!(error = %e, "tablet agent failed to start");
            *self.lifecycle.lock() = Lifecycle::Stopped;
            self.batch_token.cancel();
            return Err(e);
        }

        self.query_service.register_agent(&self.alias);
        self.transition(Lifecycle::Starting, Lifecycle::Running)?;

        let target = self.config.tablet.target_tablet_type;
        TARGET_TABLET_TYPE.with_label_values(&[target.as_str()]).set(1);

        let health_loop = self.spawn_health_check_loop();
        *self.health_loop.lock() = health_loop;

        info!("tablet agent running");
        Ok(())
    }

    async fn start_locked(
        &self,
        mysql_port: u16,
        vt_port: u16,
        vts_port: u16,
    ) -> Result<()> {
        let guard = self.action_lock.acquire("Start").await?;

        // the record must exist before it is registered
        self.read_tablet(&guard).await?;
        self.register(&guard, mysql_port, vt_port, vts_port).await?;
        self.reload(&guard).await?;
        self.verify_topology(&guard).await;

        if let Err(e) = self.verify_serving_addrs(&guard).await {
            warn!(alias = %self.alias, error = %e, "tablet verify serving addrs failed");
        }

        // dependent services start from an empty previous record
        if let Err(e) = self.dispatcher.update_state(&self.state, &Tablet::default(), "Start").await {
            warn!(alias = %self.alias, error = %e, "initial updateState failed, will need a state change before running properly");
        }
        Ok(())
    }

    /// Stops background work, then the binlog players, then the daemon handle.
    ///
    /// Calling it again is a no-op.
    pub async fn stop(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle == Lifecycle::Stopped {
                return;
            }
            *lifecycle = Lifecycle::Stopped;
        }
        info!(alias = %self.alias, "stopping tablet agent");

        self.batch_token.cancel();
        let health_loop = self.health_loop.lock().take();
        if let Some(handle) = health_loop {
            if let Err(e) = handle.await {
                debug!(error = %e, "health check loop ended abnormally");
            }
        }

        self.binlog_players.stop_all_players_and_reset().await;
        self.mysqld.close().await;
        info!(alias = %self.alias, "tablet agent stopped");
    }

    fn ensure_running(
        &self,
        action: &str,
    ) -> Result<()> {
        let lifecycle = self.lifecycle();
        if lifecycle != Lifecycle::Running {
            debug!(alias = %self.alias, %action, lifecycle = lifecycle.as_str(), "action rejected");
            return Err(AgentError::InvalidLifecycle {
                from: lifecycle.as_str(),
                to: Lifecycle::Running.as_str(),
            }
            .into());
        }
        Ok(())
    }

    fn transition(
        &self,
        from: Lifecycle,
        to: Lifecycle,
    ) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle != from {
            return Err(AgentError::InvalidLifecycle {
                from: lifecycle.as_str(),
                to: to.as_str(),
            }
            .into());
        }
        *lifecycle = to;
        Ok(())
    }
}
