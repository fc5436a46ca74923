//! Assembles an [`ActionAgent`] from its collaborators.
//!
//! Only the topology store is mandatory. Everything else falls back to a
//! default suitable for the standalone daemon:
//! - host resolution through the operating system,
//! - a daemon handle fixed to the configured mysql port,
//! - a logging state-change callback and no query service or binlog players,
//! - a health reporter that follows daemon availability.
//!
//! ## Example
//! ```ignore
//! let agent = AgentBuilder::new(config, topo)
//!     .resolver(Arc::new(StaticResolver::new("host-a")))
//!     .start()
//!     .await?;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use super::ActionAgent;
use super::ActionLock;
use super::HealthHistory;
use super::HealthStreamBroadcaster;
use super::Lifecycle;
use super::StateChangeDispatcher;
use super::TabletState;
use crate::config::AgentConfig;
use crate::mysqld::MysqlDaemon;
use crate::mysqld::StaticMysqlDaemon;
use crate::services::BinlogPlayerMap;
use crate::services::DaemonHealthReporter;
use crate::services::HealthReporter;
use crate::services::LoggingStateChangeCallback;
use crate::services::NoopBinlogPlayerMap;
use crate::services::NoopQueryService;
use crate::services::QueryServiceControl;
use crate::services::StateChangeCallback;
use crate::topo::TopoServer;
use crate::utils::net::HostResolver;
use crate::utils::net::SystemResolver;
use crate::Result;

pub struct AgentBuilder {
    config: AgentConfig,
    topo: Arc<dyn TopoServer>,
    mysqld: Option<Arc<dyn MysqlDaemon>>,
    resolver: Option<Arc<dyn HostResolver>>,
    callback: Option<Arc<dyn StateChangeCallback>>,
    query_service: Option<Arc<dyn QueryServiceControl>>,
    binlog_players: Option<Arc<dyn BinlogPlayerMap>>,
    health_reporter: Option<Arc<dyn HealthReporter>>,
    batch_token: Option<CancellationToken>,
}

impl AgentBuilder {
    pub fn new(
        config: AgentConfig,
        topo: Arc<dyn TopoServer>,
    ) -> Self {
        Self {
            config,
            topo,
            mysqld: None,
            resolver: None,
            callback: None,
            query_service: None,
            binlog_players: None,
            health_reporter: None,
            batch_token: None,
        }
    }

    pub fn mysqld(
        mut self,
        mysqld: Arc<dyn MysqlDaemon>,
    ) -> Self {
        self.mysqld = Some(mysqld);
        self
    }

    pub fn resolver(
        mut self,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn state_change_callback(
        mut self,
        callback: Arc<dyn StateChangeCallback>,
    ) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn query_service(
        mut self,
        query_service: Arc<dyn QueryServiceControl>,
    ) -> Self {
        self.query_service = Some(query_service);
        self
    }

    pub fn binlog_players(
        mut self,
        binlog_players: Arc<dyn BinlogPlayerMap>,
    ) -> Self {
        self.binlog_players = Some(binlog_players);
        self
    }

    pub fn health_reporter(
        mut self,
        health_reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        self.health_reporter = Some(health_reporter);
        self
    }

    /// Long-lived context the agent's background work runs under.
    ///
    /// The agent works on a child of this token; stopping the agent or a
    /// failed start cancels the child only.
    pub fn batch_token(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.batch_token = Some(token);
        self
    }

    /// Assembles an agent in the `Uninitialized` state.
    pub fn build(self) -> Arc<ActionAgent> {
        let alias = self.config.tablet.alias();
        let mysqld = self
            .mysqld
            .unwrap_or_else(|| Arc::new(StaticMysqlDaemon::new(self.config.tablet.mysql_port)));
        let health_reporter = self
            .health_reporter
            .unwrap_or_else(|| Arc::new(DaemonHealthReporter::new(mysqld.clone())));
        let callback = self
            .callback
            .unwrap_or_else(|| Arc::new(LoggingStateChangeCallback));

        Arc::new(ActionAgent {
            alias,
            topo: self.topo,
            mysqld,
            resolver: self.resolver.unwrap_or_else(|| Arc::new(SystemResolver)),
            query_service: self.query_service.unwrap_or_else(|| Arc::new(NoopQueryService)),
            binlog_players: self.binlog_players.unwrap_or_else(|| Arc::new(NoopBinlogPlayerMap)),
            health_reporter,

            state: TabletState::new(),
            dispatcher: StateChangeDispatcher::new(callback),
            health_stream: HealthStreamBroadcaster::new(self.config.health.stream_buffer_size),
            history: HealthHistory::new(self.config.health.history_length),
            action_lock: ActionLock::new(self.config.action.lock_timeout()),
            health_check_lock: tokio::sync::Mutex::new(()),

            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            batch_token: self.batch_token.map(|t| t.child_token()).unwrap_or_default(),
            health_loop: Mutex::new(None),
            config: self.config,
        })
    }

    /// Builds the agent and starts it with the configured ports.
    ///
    /// An unset mysql port is asked from the daemon; if the daemon cannot
    /// tell, the stored value is left as it is.
    pub async fn start(self) -> Result<Arc<ActionAgent>> {
        let agent = self.build();
        let tablet = &agent.config.tablet;

        let mut mysql_port = tablet.mysql_port;
        if mysql_port == 0 {
            match agent.mysqld.get_mysql_port().await {
                Ok(port) => mysql_port = port,
                Err(e) => warn!(alias = %agent.alias, error = %e, "Cannot get current mysql port, will keep the stored one"),
            }
        }

        info!(alias = %agent.alias, "starting tablet agent");
        agent.start(mysql_port, tablet.vt_port, tablet.vts_port).await?;
        Ok(agent)
    }
}
