use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing_test::traced_test;

use super::dispatcher::StateChangeDispatcher;
use super::state::TabletState;
use crate::services::MockStateChangeCallback;
use crate::services::StateChangeCallback;
use crate::topo::Tablet;
use crate::topo::TabletAlias;
use crate::topo::TabletControl;
use crate::topo::TabletInfo;
use crate::topo::TabletType;
use crate::AgentError;
use crate::Error;
use crate::Result;

fn cached(tablet_type: TabletType) -> TabletInfo {
    TabletInfo::new(
        Tablet {
            alias: TabletAlias::new("cell1", 100),
            tablet_type,
            ..Default::default()
        },
        1,
    )
}

#[tokio::test]
#[traced_test]
async fn callback_receives_old_and_cached_record() {
    let state = TabletState::new();
    state.set_tablet(cached(TabletType::Replica));

    let mut callback = MockStateChangeCallback::new();
    callback
        .expect_on_state_change()
        .withf(|_, old, new| *old == Tablet::default() && new.tablet_type == TabletType::Replica)
        .times(1)
        .returning(|_, _, _| Ok(()));

    let dispatcher = StateChangeDispatcher::new(Arc::new(callback));
    dispatcher.update_state(&state, &Tablet::default(), "Start").await.unwrap();

    assert!(logs_contain("Running tablet callback because: Start"));
}

#[tokio::test]
async fn missing_cached_record_is_not_dispatched() {
    let state = TabletState::new();

    let mut callback = MockStateChangeCallback::new();
    callback.expect_on_state_change().times(0);

    let dispatcher = StateChangeDispatcher::new(Arc::new(callback));
    let err = dispatcher
        .update_state(&state, &Tablet::default(), "Start")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Agent(AgentError::NotInitialized)));
}

#[tokio::test]
#[traced_test]
async fn callback_failure_is_returned() {
    let state = TabletState::new();
    state.set_tablet(cached(TabletType::Replica));

    let mut callback = MockStateChangeCallback::new();
    callback
        .expect_on_state_change()
        .times(1)
        .returning(|_, _, _| Err(AgentError::Callback("query service refused".into()).into()));

    let dispatcher = StateChangeDispatcher::new(Arc::new(callback));
    let err = dispatcher
        .update_state(&state, &Tablet::default(), "refresh")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("query service refused"));
    assert!(logs_contain("state change callback failed"));
}

/// Records overlapping invocations.
struct SlowCallback {
    running: AtomicUsize,
    max_running: AtomicUsize,
}

#[async_trait]
impl StateChangeCallback for SlowCallback {
    async fn on_state_change(
        &self,
        _state: &TabletState,
        _old_tablet: &Tablet,
        _new_tablet: &Tablet,
    ) -> Result<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invocations_never_overlap() {
    let state = Arc::new(TabletState::new());
    state.set_tablet(cached(TabletType::Replica));
    let callback = Arc::new(SlowCallback {
        running: AtomicUsize::new(0),
        max_running: AtomicUsize::new(0),
    });
    let dispatcher = Arc::new(StateChangeDispatcher::new(callback.clone()));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let state = state.clone();
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            dispatcher.update_state(&state, &Tablet::default(), "concurrent").await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(callback.max_running.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn callback_replaces_tablet_control_on_each_transition() {
    let state = TabletState::new();
    state.set_tablet(cached(TabletType::Replica));

    let mut callback = MockStateChangeCallback::new();
    callback.expect_on_state_change().returning(|state, _, new| {
        let control = match new.tablet_type {
            TabletType::Replica => TabletControl {
                blacklisted_tables: vec!["t1".into(), "t2".into()],
                disable_query_service: false,
            },
            _ => TabletControl {
                blacklisted_tables: vec![],
                disable_query_service: true,
            },
        };
        state.set_tablet_control(Some(control));
        Ok(())
    });
    let dispatcher = StateChangeDispatcher::new(Arc::new(callback));

    dispatcher.update_state(&state, &Tablet::default(), "Start").await.unwrap();
    assert_eq!(state.blacklisted_tables(), vec!["t1".to_string(), "t2".to_string()]);
    assert!(!state.disable_query_service());

    let old = state.tablet().unwrap();
    state.set_tablet(cached(TabletType::Spare));
    dispatcher.update_state(&state, &old, "refresh").await.unwrap();
    assert!(state.blacklisted_tables().is_empty());
    assert!(state.disable_query_service());
}
