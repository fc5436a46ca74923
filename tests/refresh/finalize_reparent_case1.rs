//! Case 1: a refresh whose re-read fails is surfaced and dispatches nothing.
//!
//! Scenario:
//!
//! 1. The agent starts normally.
//! 2. The tablet record disappears from the store.
//! 3. A refresh runs with reason `finalize-reparent`.
//!
//! Expected Result:
//!
//! - The refresh returns an error whose message contains `finalize-reparent`.
//! - The state-change callback is not invoked again.
//! - The cached record is the last one read successfully.

use std::sync::Arc;

use tablet_agent::topo::TabletType;
use tablet_agent::AgentError;
use tablet_agent::Error;
use tablet_agent::TopoError;

use crate::common::alias;
use crate::common::builder;
use crate::common::seeded_topo;
use crate::common::RecordingCallback;

#[tokio::test]
async fn test_failed_reread_returns_reason_without_dispatch() {
    let topo = seeded_topo(TabletType::Replica);
    let callback = Arc::new(RecordingCallback::default());
    let agent = builder(topo.clone(), callback.clone()).start().await.unwrap();
    let cached = agent.tablet().unwrap();
    assert_eq!(callback.transitions().len(), 1);

    assert!(topo.delete_tablet(&alias()));
    let err = agent.refresh("finalize-reparent").await.unwrap_err();

    assert!(err.to_string().contains("finalize-reparent"), "got: {err}");
    assert!(matches!(
        &err,
        Error::Agent(AgentError::RefreshFailed { source, .. })
            if matches!(**source, Error::Topo(TopoError::NotFound { .. }))
    ));
    assert_eq!(callback.transitions().len(), 1);
    assert_eq!(agent.tablet().unwrap(), cached);

    // the agent stays usable once the record is back
    topo.create_tablet(cached.clone());
    agent.refresh("RefreshState").await.unwrap();
    assert_eq!(callback.transitions().len(), 2);
    agent.stop().await;
}
