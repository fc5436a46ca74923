//! Topology store seam.
//!
//! The topology store is the durable owner of the tablet record and the
//! serving-address directory. It is shared by every tablet in the cluster and
//! may be concurrently written by other processes, so every write the agent
//! makes is a read-modify-write against the currently stored value.

mod memory;
mod types;
pub use memory::*;
pub use types::*;

#[cfg(test)]
mod memory_test;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Field-scoped update applied by the store to the currently stored record.
///
/// `FnMut` because the store re-applies it when it loses a race with a
/// concurrent writer.
pub type TabletMutator = Box<dyn FnMut(&mut Tablet) -> Result<()> + Send>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TopoServer: Send + Sync + 'static {
    /// Returns `TopoError::NotFound` when no record exists for `alias`.
    async fn get_tablet(
        &self,
        alias: &TabletAlias,
    ) -> Result<TabletInfo>;

    /// Applies `update` to the stored record and writes it back.
    ///
    /// Conflicting concurrent writers are retried by the store itself.
    async fn update_tablet_fields(
        &self,
        alias: &TabletAlias,
        update: TabletMutator,
    ) -> Result<()>;

    /// Writes `tablet` back if the stored version still matches, returning the new version.
    async fn update_tablet(
        &self,
        tablet: &TabletInfo,
    ) -> Result<u64>;

    /// Publishes `addr` in the serving-address directory.
    async fn update_tablet_endpoint(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
        addr: &EndPoint,
    ) -> Result<()>;

    /// Consistency check between the alias and the store's views of it.
    async fn validate_tablet(
        &self,
        alias: &TabletAlias,
    ) -> Result<()>;
}
