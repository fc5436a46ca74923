//! Narrow seams to the collaborators the agent drives but does not own:
//! the query-serving engine, the binlog player subsystem, the health
//! reporter and the state-change callback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::info;

use crate::mysqld::MysqlDaemon;
use crate::topo::Tablet;
use crate::topo::TabletAlias;
use crate::topo::TabletType;
use crate::Result;
use crate::TabletState;

/// Query-serving engine registration hook.
#[cfg_attr(test, automock)]
pub trait QueryServiceControl: Send + Sync + 'static {
    /// Exposes the agent's RPC surface for `alias`.
    fn register_agent(
        &self,
        alias: &TabletAlias,
    );
}

/// Binlog replication players owned by this tablet.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BinlogPlayerMap: Send + Sync + 'static {
    async fn stop_all_players_and_reset(&self);
}

/// Result of one health evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthReport {
    pub replication_delay: Duration,
    /// `None` when healthy
    pub error: Option<String>,
}

impl HealthReport {
    pub fn healthy(replication_delay: Duration) -> Self {
        Self {
            replication_delay,
            error: None,
        }
    }

    pub fn unhealthy(
        replication_delay: Duration,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            replication_delay,
            error: Some(reason.into()),
        }
    }
}

/// Computes the tablet's health; the agent only stores and republishes it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HealthReporter: Send + Sync + 'static {
    async fn report(
        &self,
        tablet_type: TabletType,
        should_query_service_be_running: bool,
    ) -> HealthReport;
}

/// Invoked with the previous and the current tablet record on every transition.
///
/// Implementations diff the two records and start or stop dependent services.
/// The callback also owns the tablet control: on each transition it fetches
/// the current control record for the tablet and installs it through
/// [`TabletState::set_tablet_control`], replacing the previous one wholesale.
/// The agent never refreshes it on its own.
/// The dispatcher never runs two invocations concurrently.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateChangeCallback: Send + Sync + 'static {
    async fn on_state_change(
        &self,
        state: &TabletState,
        old_tablet: &Tablet,
        new_tablet: &Tablet,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NoopQueryService;

impl QueryServiceControl for NoopQueryService {
    fn register_agent(
        &self,
        alias: &TabletAlias,
    ) {
        debug!(%alias, "no query service to register with");
    }
}

/// Used when the tablet runs no binlog players.
#[derive(Debug, Default)]
pub struct NoopBinlogPlayerMap;

#[async_trait]
impl BinlogPlayerMap for NoopBinlogPlayerMap {
    async fn stop_all_players_and_reset(&self) {
        debug!("no binlog players to stop");
    }
}

/// Callback used by the standalone daemon: records each transition in the log.
#[derive(Debug, Default)]
pub struct LoggingStateChangeCallback;

#[async_trait]
impl StateChangeCallback for LoggingStateChangeCallback {
    async fn on_state_change(
        &self,
        state: &TabletState,
        old_tablet: &Tablet,
        new_tablet: &Tablet,
    ) -> Result<()> {
        if old_tablet.tablet_type != new_tablet.tablet_type {
            info!(
                alias = %new_tablet.alias,
                from = %old_tablet.tablet_type,
                to = %new_tablet.tablet_type,
                "tablet type changed"
            );
        }
        if old_tablet.port_map != new_tablet.port_map {
            info!(alias = %new_tablet.alias, ports = ?new_tablet.port_map, "port map changed");
        }
        debug!(
            alias = %new_tablet.alias,
            accepting_queries = state.accepting_queries(),
            "state change applied"
        );
        Ok(())
    }
}

/// Reports healthy while the database daemon answers, with no replication delay measurement.
pub struct DaemonHealthReporter {
    mysqld: Arc<dyn MysqlDaemon>,
}

impl DaemonHealthReporter {
    pub fn new(mysqld: Arc<dyn MysqlDaemon>) -> Self {
        Self { mysqld }
    }
}

#[async_trait]
impl HealthReporter for DaemonHealthReporter {
    async fn report(
        &self,
        _tablet_type: TabletType,
        _should_query_service_be_running: bool,
    ) -> HealthReport {
        match self.mysqld.get_mysql_port().await {
            Ok(_) => HealthReport::healthy(Duration::ZERO),
            Err(e) => HealthReport::unhealthy(Duration::ZERO, e.to_string()),
        }
    }
}
