//! Tablet State Store.
//!
//! Every accessor takes the lock for one get or set and returns owned values,
//! so no caller ever holds a reference into protected state or keeps the lock
//! across a topology round trip.

use std::time::Duration;

use parking_lot::Mutex;

use crate::topo::Tablet;
use crate::topo::TabletControl;
use crate::topo::TabletInfo;
use crate::HealthError;

#[derive(Debug)]
struct StateInner {
    tablet: Option<TabletInfo>,
    tablet_control: Option<TabletControl>,
    replication_delay: Duration,
    health_error: Option<HealthError>,
}

/// Cached tablet record, control overrides and latest health outcome.
#[derive(Debug)]
pub struct TabletState {
    inner: Mutex<StateInner>,
}

impl Default for TabletState {
    fn default() -> Self {
        Self::new()
    }
}

impl TabletState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StateInner {
                tablet: None,
                tablet_control: None,
                replication_delay: Duration::ZERO,
                health_error: Some(HealthError::NotRunYet),
            }),
        }
    }

    /// Cached record plus the store version it was read at.
    pub fn tablet_info(&self) -> Option<TabletInfo> {
        self.inner.lock().tablet.clone()
    }

    /// Cached record, `None` until the first successful read.
    pub fn tablet(&self) -> Option<Tablet> {
        self.inner.lock().tablet.as_ref().map(|info| info.tablet.clone())
    }

    pub fn set_tablet(
        &self,
        tablet: TabletInfo,
    ) {
        self.inner.lock().tablet = Some(tablet);
    }

    /// Latest replication delay and health outcome.
    ///
    /// Reports `HealthError::NotRunYet` until the first health check is stored.
    pub fn healthy(&self) -> (Duration, Result<(), HealthError>) {
        let inner = self.inner.lock();
        let health = match &inner.health_error {
            None => Ok(()),
            Some(e) => Err(e.clone()),
        };
        (inner.replication_delay, health)
    }

    pub fn set_health(
        &self,
        replication_delay: Duration,
        health_error: Option<HealthError>,
    ) {
        let mut inner = self.inner.lock();
        inner.replication_delay = replication_delay;
        inner.health_error = health_error;
    }

    /// Replaces the control record wholesale; `None` clears every override.
    pub fn set_tablet_control(
        &self,
        tablet_control: Option<TabletControl>,
    ) {
        self.inner.lock().tablet_control = tablet_control;
    }

    pub fn tablet_control(&self) -> Option<TabletControl> {
        self.inner.lock().tablet_control.clone()
    }

    pub fn blacklisted_tables(&self) -> Vec<String> {
        self.inner
            .lock()
            .tablet_control
            .as_ref()
            .map(|c| c.blacklisted_tables.clone())
            .unwrap_or_default()
    }

    pub fn disable_query_service(&self) -> bool {
        self.inner
            .lock()
            .tablet_control
            .as_ref()
            .map(|c| c.disable_query_service)
            .unwrap_or(false)
    }

    /// Whether the tablet should currently admit query traffic.
    ///
    /// Requires a cached record of a serving type that no control override disables.
    pub fn accepting_queries(&self) -> bool {
        let inner = self.inner.lock();
        let serving = inner
            .tablet
            .as_ref()
            .map(|info| info.tablet.is_serving_type())
            .unwrap_or(false);
        let disabled = inner
            .tablet_control
            .as_ref()
            .map(|c| c.disable_query_service)
            .unwrap_or(false);
        serving && !disabled
    }
}
