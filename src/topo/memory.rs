use std::collections::BTreeMap;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use super::EndPoint;
use super::Tablet;
use super::TabletAlias;
use super::TabletInfo;
use super::TabletMutator;
use super::TabletType;
use super::TopoServer;
use crate::Result;
use crate::TopoError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ServingKey {
    cell: String,
    keyspace: String,
    shard: String,
    tablet_type: TabletType,
}

#[derive(Debug, Default)]
struct Inner {
    // (record, version)
    tablets: HashMap<TabletAlias, (Tablet, u64)>,
    serving: HashMap<ServingKey, BTreeMap<u32, EndPoint>>,
}

/// In-process topology store.
///
/// Backs the standalone daemon and the integration tests. Versions start at 1
/// and increase on every write, so stale `update_tablet` calls are rejected the
/// same way a shared store would reject them.
#[derive(Debug, Default)]
pub struct MemoryTopoServer {
    inner: RwLock<Inner>,
}

impl MemoryTopoServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the initial record for a tablet, replacing any existing one.
    pub fn create_tablet(
        &self,
        tablet: Tablet,
    ) {
        let mut inner = self.inner.write();
        let version = inner.tablets.get(&tablet.alias).map(|(_, v)| v + 1).unwrap_or(1);
        debug!(alias = %tablet.alias, version, "tablet record created");
        inner.tablets.insert(tablet.alias.clone(), (tablet, version));
    }

    /// Removes a record, returning whether it existed.
    pub fn delete_tablet(
        &self,
        alias: &TabletAlias,
    ) -> bool {
        self.inner.write().tablets.remove(alias).is_some()
    }

    /// Endpoints currently published for one serving-address key.
    pub fn serving_end_points(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
    ) -> Vec<EndPoint> {
        let key = ServingKey {
            cell: cell.to_string(),
            keyspace: keyspace.to_string(),
            shard: shard.to_string(),
            tablet_type,
        };
        self.inner
            .read()
            .serving
            .get(&key)
            .map(|eps| eps.values().cloned().collect())
            .unwrap_or_default()
    }

    fn not_found(alias: &TabletAlias) -> TopoError {
        TopoError::NotFound {
            alias: alias.clone(),
        }
    }
}

#[async_trait]
impl TopoServer for MemoryTopoServer {
    async fn get_tablet(
        &self,
        alias: &TabletAlias,
    ) -> Result<TabletInfo> {
        let inner = self.inner.read();
        let (tablet, version) = inner.tablets.get(alias).ok_or_else(|| Self::not_found(alias))?;
        Ok(TabletInfo::new(tablet.clone(), *version))
    }

    async fn update_tablet_fields(
        &self,
        alias: &TabletAlias,
        mut update: TabletMutator,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let (tablet, version) = inner.tablets.get_mut(alias).ok_or_else(|| Self::not_found(alias))?;

        // work on a copy so a failing mutator leaves the record untouched
        let mut updated = tablet.clone();
        update(&mut updated)?;
        *tablet = updated;
        *version += 1;
        trace!(%alias, version = *version, "tablet fields updated");
        Ok(())
    }

    async fn update_tablet(
        &self,
        tablet: &TabletInfo,
    ) -> Result<u64> {
        let alias = &tablet.tablet.alias;
        let mut inner = self.inner.write();
        let (stored, version) = inner.tablets.get_mut(alias).ok_or_else(|| Self::not_found(alias))?;

        if *version != tablet.version {
            return Err(TopoError::Unavailable(format!(
                "bad version for {}: stored {}, given {}",
                alias, version, tablet.version
            ))
            .into());
        }

        *stored = tablet.tablet.clone();
        *version += 1;
        Ok(*version)
    }

    async fn update_tablet_endpoint(
        &self,
        cell: &str,
        keyspace: &str,
        shard: &str,
        tablet_type: TabletType,
        addr: &EndPoint,
    ) -> Result<()> {
        let key = ServingKey {
            cell: cell.to_string(),
            keyspace: keyspace.to_string(),
            shard: shard.to_string(),
            tablet_type,
        };
        let mut inner = self.inner.write();
        inner.serving.entry(key).or_default().insert(addr.uid, addr.clone());
        Ok(())
    }

    async fn validate_tablet(
        &self,
        alias: &TabletAlias,
    ) -> Result<()> {
        let inner = self.inner.read();
        let (tablet, _) = inner.tablets.get(alias).ok_or_else(|| Self::not_found(alias))?;

        if &tablet.alias != alias {
            return Err(TopoError::Validation(format!(
                "tablet stored under {} claims alias {}",
                alias, tablet.alias
            ))
            .into());
        }

        if tablet.is_serving_type() && (tablet.keyspace.is_empty() || tablet.shard.is_empty()) {
            return Err(TopoError::Validation(format!(
                "serving tablet {} is not assigned to a keyspace/shard",
                alias
            ))
            .into());
        }

        Ok(())
    }
}
