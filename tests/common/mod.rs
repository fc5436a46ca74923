use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tablet_agent::config::AgentConfig;
use tablet_agent::mysqld::StaticMysqlDaemon;
use tablet_agent::services::HealthReport;
use tablet_agent::services::HealthReporter;
use tablet_agent::services::StateChangeCallback;
use tablet_agent::topo::MemoryTopoServer;
use tablet_agent::topo::Tablet;
use tablet_agent::topo::TabletAlias;
use tablet_agent::topo::TabletType;
use tablet_agent::utils::net::StaticResolver;
use tablet_agent::AgentBuilder;
use tablet_agent::TabletState;

pub const CELL: &str = "cell1";
pub const UID: u32 = 100;
pub const HOSTNAME: &str = "host-a";
pub const VT_PORT: u16 = 15000;
pub const MYSQL_PORT: u16 = 3306;
pub const HOST_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));

pub fn alias() -> TabletAlias {
    TabletAlias::new(CELL, UID)
}

/// Config for `cell1-0000000100` with hostname override `host-a`, port map `{vt: 15000}`.
pub fn agent_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.tablet.cell = CELL.to_string();
    config.tablet.uid = UID;
    config.tablet.hostname = HOSTNAME.to_string();
    config.tablet.vt_port = VT_PORT;
    config.tablet.mysql_port = MYSQL_PORT;
    config.health.check_interval_in_ms = 0;
    config
}

/// Store holding only the operator-provisioned part of the record.
pub fn seeded_topo(tablet_type: TabletType) -> Arc<MemoryTopoServer> {
    let topo = Arc::new(MemoryTopoServer::new());
    topo.create_tablet(Tablet {
        alias: alias(),
        keyspace: "commerce".to_string(),
        shard: "-80".to_string(),
        tablet_type,
        ..Default::default()
    });
    topo
}

pub fn builder(
    topo: Arc<MemoryTopoServer>,
    callback: Arc<RecordingCallback>,
) -> AgentBuilder {
    AgentBuilder::new(agent_config(), topo)
        .mysqld(Arc::new(StaticMysqlDaemon::new(MYSQL_PORT)))
        .resolver(Arc::new(StaticResolver::new("localhost").with_addr(HOSTNAME, HOST_IP)))
        .state_change_callback(callback)
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub old: Tablet,
    pub new: Tablet,
}

#[derive(Debug, Default)]
pub struct RecordingCallback {
    transitions: Mutex<Vec<Transition>>,
}

impl RecordingCallback {
    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions.lock().clone()
    }
}

#[async_trait]
impl StateChangeCallback for RecordingCallback {
    async fn on_state_change(
        &self,
        _state: &TabletState,
        old_tablet: &Tablet,
        new_tablet: &Tablet,
    ) -> tablet_agent::Result<()> {
        self.transitions.lock().push(Transition {
            old: old_tablet.clone(),
            new: new_tablet.clone(),
        });
        Ok(())
    }
}

/// Hands out the given replication delays, one per health check.
#[derive(Debug)]
pub struct ScriptedReporter {
    delays: Mutex<Vec<Duration>>,
}

impl ScriptedReporter {
    pub fn new(mut delays: Vec<Duration>) -> Self {
        delays.reverse();
        Self {
            delays: Mutex::new(delays),
        }
    }
}

#[async_trait]
impl HealthReporter for ScriptedReporter {
    async fn report(
        &self,
        _tablet_type: TabletType,
        _should_query_service_be_running: bool,
    ) -> HealthReport {
        let delay = self.delays.lock().pop().unwrap_or_default();
        // give the other check a chance to interleave
        tokio::task::yield_now().await;
        HealthReport::healthy(delay)
    }
}
