//! Case 1: a freshly started agent registers itself and starts dependent services.
//!
//! Scenario:
//!
//! 1. The store holds a record for `cell1-0000000100` with only keyspace, shard and type.
//! 2. The agent starts with hostname override `host-a` and port map `{vt: 15000}`.
//!
//! Expected Result:
//!
//! - The stored record carries hostname `host-a` and port `vt=15000`.
//! - The initial state change fires exactly once, from an empty record to the new one.
//! - Health is "not run yet" until the first check.

use std::sync::Arc;

use tablet_agent::topo::Tablet;
use tablet_agent::topo::TabletType;
use tablet_agent::topo::TopoServer;
use tablet_agent::HealthError;
use tablet_agent::Lifecycle;

use crate::common::alias;
use crate::common::builder;
use crate::common::seeded_topo;
use crate::common::RecordingCallback;
use crate::common::HOSTNAME;
use crate::common::HOST_IP;
use crate::common::MYSQL_PORT;
use crate::common::VT_PORT;

#[tokio::test]
async fn test_start_registers_tablet_and_dispatches_once() {
    let topo = seeded_topo(TabletType::Replica);
    let callback = Arc::new(RecordingCallback::default());

    let agent = builder(topo.clone(), callback.clone()).start().await.unwrap();
    assert_eq!(agent.lifecycle(), Lifecycle::Running);
    assert_eq!(agent.alias().to_string(), "cell1-0000000100");

    let stored = topo.get_tablet(&alias()).await.unwrap().tablet;
    assert_eq!(stored.hostname, HOSTNAME);
    assert_eq!(stored.ip_addr, HOST_IP.to_string());
    assert_eq!(stored.port("vt"), Some(VT_PORT));
    assert_eq!(stored.mysql_port(), MYSQL_PORT);
    assert_eq!(stored.keyspace, "commerce");
    assert_eq!(stored.shard, "-80");

    assert_eq!(agent.tablet().unwrap(), stored);

    let transitions = callback.transitions();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].old, Tablet::default());
    assert_eq!(transitions[0].new, stored);

    let addrs = topo.serving_end_points("cell1", "commerce", "-80", TabletType::Replica);
    assert_eq!(addrs.len(), 1);
    assert_eq!(addrs[0].host, HOSTNAME);

    assert_eq!(agent.healthy().1, Err(HealthError::NotRunYet));
    agent.stop().await;
}
