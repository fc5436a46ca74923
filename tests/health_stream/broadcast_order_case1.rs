//! Case 1: replies from concurrent health checks arrive in the order the checks ran.
//!
//! Scenario:
//!
//! 1. A subscriber registers before any health check.
//! 2. Two health checks run concurrently; the reporter yields delays 2s then 5s.
//!
//! Expected Result:
//!
//! - The subscriber receives exactly two replies: delay=2s, then delay=5s.
//! - The state store ends with delay=5s and a healthy status.

use std::sync::Arc;
use std::time::Duration;

use tablet_agent::topo::TabletType;

use crate::common::builder;
use crate::common::seeded_topo;
use crate::common::RecordingCallback;
use crate::common::ScriptedReporter;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_checks_are_received_in_order() {
    let topo = seeded_topo(TabletType::Replica);
    let reporter = Arc::new(ScriptedReporter::new(vec![Duration::from_secs(2), Duration::from_secs(5)]));
    let agent = builder(topo, Arc::new(RecordingCallback::default()))
        .health_reporter(reporter)
        .start()
        .await
        .unwrap();

    let mut sub = agent.subscribe_health();
    assert_eq!(agent.health_stream_map_size(), 1);

    let first = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run_health_check().await })
    };
    let second = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run_health_check().await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let r1 = sub.receiver.recv().await.unwrap();
    let r2 = sub.receiver.recv().await.unwrap();
    assert_eq!(r1.replication_delay, Duration::from_secs(2));
    assert_eq!(r2.replication_delay, Duration::from_secs(5));
    assert!(sub.receiver.try_recv().is_err());

    assert_eq!(agent.healthy(), (Duration::from_secs(5), Ok(())));
    assert_eq!(agent.health_history().len(), 2);

    assert!(agent.unsubscribe_health(sub.id));
    assert_eq!(agent.health_stream_map_size(), 0);
    agent.stop().await;
}
