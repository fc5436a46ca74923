//! Case 2: a subscriber that never reads does not hold back anyone else.
//!
//! Scenario:
//!
//! 1. Stream buffers hold one reply.
//! 2. One subscriber never reads, another reads after every check.
//! 3. Several health checks run.
//!
//! Expected Result:
//!
//! - Every check completes promptly.
//! - The reading subscriber sees every reply; the stalled one keeps only the first.

use std::sync::Arc;
use std::time::Duration;

use tablet_agent::topo::TabletType;
use tokio_stream::StreamExt;

use crate::common::builder;
use crate::common::seeded_topo;
use crate::common::RecordingCallback;
use crate::common::ScriptedReporter;

#[tokio::test]
async fn test_full_subscriber_does_not_block_health_checks() {
    let topo = seeded_topo(TabletType::Replica);
    let delays: Vec<Duration> = (1..=5).map(Duration::from_secs).collect();
    let agent = builder(topo, Arc::new(RecordingCallback::default()))
        .health_reporter(Arc::new(ScriptedReporter::new(delays.clone())))
        .start()
        .await
        .unwrap();

    let mut stalled = agent.subscribe_health();
    let live = agent.subscribe_health();
    assert_ne!(stalled.id, live.id);
    let mut live = live.into_stream();

    for expected in &delays {
        tokio::time::timeout(Duration::from_secs(1), agent.run_health_check())
            .await
            .expect("health check must not block on a full subscriber")
            .unwrap();
        assert_eq!(live.next().await.unwrap().replication_delay, *expected);
    }

    assert_eq!(stalled.receiver.recv().await.unwrap().replication_delay, delays[0]);
    assert!(stalled.receiver.try_recv().is_err());
    assert_eq!(agent.health_stream_map_size(), 2);
    agent.stop().await;
}
