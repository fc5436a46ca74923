//! Topology Synchronization Protocol.
//!
//! Keeps the topology store's record for this tablet consistent with local
//! reality and reconciles the cached copy afterward. All steps run under the
//! action lock and every write is a read-modify-write against the stored
//! record, since other processes may be writing it concurrently.

use autometrics::autometrics;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::ActionAgent;
use super::ActionGuard;
use crate::metrics::MYSQL_PORT_DRIFT_TOTAL;
use crate::metrics::REFRESH_TOTAL;
use crate::topo::Tablet;
use crate::topo::TabletInfo;
use crate::topo::MYSQL_PORT_NAME;
use crate::topo::VTS_PORT_NAME;
use crate::topo::VT_PORT_NAME;
use crate::AgentError;
use crate::Result;
use crate::API_SLO;

impl ActionAgent {
    /// Fetches the stored record for this tablet.
    pub(crate) async fn read_tablet(
        &self,
        _guard: &ActionGuard<'_>,
    ) -> Result<TabletInfo> {
        self.topo.get_tablet(&self.alias).await
    }

    /// Writes hostname, IP and port map into the stored record.
    ///
    /// Only those fields are overwritten. A `mysql_port` of 0 leaves the
    /// stored mysql port untouched; a `vts_port` of 0 removes it.
    pub(crate) async fn register(
        &self,
        _guard: &ActionGuard<'_>,
        mysql_port: u16,
        vt_port: u16,
        vts_port: u16,
    ) -> Result<()> {
        let hostname = if self.config.tablet.hostname.is_empty() {
            self.resolver.local_hostname().await?
        } else {
            self.config.tablet.hostname.clone()
        };
        let ip_addr = self.resolver.lookup_ip(&hostname).await?.to_string();
        info!(alias = %self.alias, %hostname, %ip_addr, vt_port, vts_port, mysql_port, "registering tablet");

        self.topo
            .update_tablet_fields(
                &self.alias,
                Box::new(move |tablet: &mut Tablet| -> Result<()> {
                    tablet.hostname = hostname.clone();
                    tablet.ip_addr = ip_addr.clone();
                    if mysql_port != 0 {
                        tablet.port_map.insert(MYSQL_PORT_NAME.to_string(), mysql_port);
                    }
                    tablet.port_map.insert(VT_PORT_NAME.to_string(), vt_port);
                    if vts_port != 0 {
                        tablet.port_map.insert(VTS_PORT_NAME.to_string(), vts_port);
                    } else {
                        tablet.port_map.remove(VTS_PORT_NAME);
                    }
                    Ok(())
                }),
            )
            .await
    }

    /// Replaces the cached copy with the authoritative stored record.
    pub(crate) async fn reload(
        &self,
        guard: &ActionGuard<'_>,
    ) -> Result<TabletInfo> {
        let tablet = self.read_tablet(guard).await?;
        self.state.set_tablet(tablet.clone());
        Ok(tablet)
    }

    /// Consistency check; a failure is only logged.
    pub(crate) async fn verify_topology(
        &self,
        _guard: &ActionGuard<'_>,
    ) {
        if let Err(e) = self.topo.validate_tablet(&self.alias).await {
            warn!(alias = %self.alias, error = %e, "tablet validate failed");
        }
    }

    /// Publishes this tablet's endpoint when its type is a serving one.
    pub(crate) async fn verify_serving_addrs(
        &self,
        _guard: &ActionGuard<'_>,
    ) -> Result<()> {
        let tablet = self.state.tablet().ok_or(AgentError::NotInitialized)?;
        if !tablet.is_serving_type() {
            debug!(alias = %self.alias, tablet_type = %tablet.tablet_type, "not a serving type, skipping endpoint");
            return Ok(());
        }

        let addr = tablet.end_point()?;
        self.topo
            .update_tablet_endpoint(
                &tablet.alias.cell,
                &tablet.keyspace,
                &tablet.shard,
                tablet.tablet_type,
                &addr,
            )
            .await
    }

    /// Compares the daemon's live port with `tablet` and writes a drifted one back.
    ///
    /// Returns the updated record, or `None` when nothing changed or the
    /// write-back failed.
    pub(crate) async fn check_tablet_mysql_port(
        &self,
        _guard: &ActionGuard<'_>,
        tablet: &TabletInfo,
    ) -> Option<TabletInfo> {
        let mysql_port = match self.mysqld.get_mysql_port().await {
            Ok(port) => port,
            Err(e) => {
                warn!(alias = %self.alias, error = %e, "Cannot get current mysql port, not checking it");
                return None;
            }
        };

        let cached_port = tablet.tablet.mysql_port();
        if mysql_port == cached_port {
            return None;
        }

        warn!(alias = %self.alias, from = cached_port, to = mysql_port, "MySQL port has changed, updating it");
        MYSQL_PORT_DRIFT_TOTAL.inc();

        let mut updated = tablet.clone();
        updated.tablet.port_map.insert(MYSQL_PORT_NAME.to_string(), mysql_port);
        match self.topo.update_tablet(&updated).await {
            Ok(version) => {
                updated.version = version;
                Some(updated)
            }
            Err(e) => {
                warn!(alias = %self.alias, error = %e, "Failed to update tablet record, may use old mysql port");
                None
            }
        }
    }

    /// Refresh-after-action: re-read, check the mysql port, store, dispatch.
    ///
    /// A failed re-read is returned to the caller and nothing is dispatched.
    #[instrument(skip(self, guard), fields(alias = %self.alias))]
    #[autometrics(objective = API_SLO)]
    pub(crate) async fn refresh_tablet(
        &self,
        guard: &ActionGuard<'_>,
        reason: &str,
    ) -> Result<()> {
        let old_tablet = self.state.tablet().unwrap_or_default();

        let mut tablet = match self.read_tablet(guard).await {
            Ok(tablet) => tablet,
            Err(e) => {
                REFRESH_TOTAL.with_label_values(&["failure"]).inc();
                warn!(%reason, error = %e, "failed rereading tablet");
                return Err(AgentError::RefreshFailed {
                    reason: reason.to_string(),
                    source: Box::new(e),
                }
                .into());
            }
        };
        if let Some(updated) = self.check_tablet_mysql_port(guard, &tablet).await {
            tablet = updated;
        }

        self.state.set_tablet(tablet);
        REFRESH_TOTAL.with_label_values(&["success"]).inc();
        self.dispatcher.update_state(&self.state, &old_tablet, reason).await
    }
}
