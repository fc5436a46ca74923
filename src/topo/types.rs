use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::TopoError;

pub const MYSQL_PORT_NAME: &str = "mysql";
pub const VT_PORT_NAME: &str = "vt";
pub const VTS_PORT_NAME: &str = "vts";

/// Immutable identifier of one tablet instance: cell plus numeric uid.
///
/// Rendered as `<cell>-<uid zero-padded to 10 digits>`, e.g. `cell1-0000000100`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TabletAlias {
    pub cell: String,
    pub uid: u32,
}

impl TabletAlias {
    pub fn new(
        cell: &str,
        uid: u32,
    ) -> Self {
        Self {
            cell: cell.to_string(),
            uid,
        }
    }
}

impl fmt::Display for TabletAlias {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}-{:010}", self.cell, self.uid)
    }
}

impl FromStr for TabletAlias {
    type Err = TopoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cell, uid) = s
            .rsplit_once('-')
            .ok_or_else(|| TopoError::Validation(format!("invalid tablet alias: {s}")))?;
        if cell.is_empty() {
            return Err(TopoError::Validation(format!("invalid tablet alias: {s}")));
        }
        let uid = uid
            .parse::<u32>()
            .map_err(|e| TopoError::Validation(format!("invalid tablet uid in {s}: {e}")))?;
        Ok(Self::new(cell, uid))
    }
}

/// Role a tablet plays in its shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabletType {
    #[default]
    Idle,
    Master,
    Replica,
    Rdonly,
    Spare,
    Experimental,
    Backup,
    Restore,
    Worker,
    Scrap,
}

impl TabletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabletType::Idle => "idle",
            TabletType::Master => "master",
            TabletType::Replica => "replica",
            TabletType::Rdonly => "rdonly",
            TabletType::Spare => "spare",
            TabletType::Experimental => "experimental",
            TabletType::Backup => "backup",
            TabletType::Restore => "restore",
            TabletType::Worker => "worker",
            TabletType::Scrap => "scrap",
        }
    }

    /// Types published in the serving-address directory.
    pub fn is_serving_type(&self) -> bool {
        matches!(self, TabletType::Master | TabletType::Replica | TabletType::Rdonly)
    }
}

impl fmt::Display for TabletType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster-visible tablet record.
///
/// Owned by the topology store; the agent only caches it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tablet {
    pub alias: TabletAlias,
    pub hostname: String,
    pub ip_addr: String,
    /// Service name ("mysql", "vt", "vts") to port
    pub port_map: BTreeMap<String, u16>,
    pub keyspace: String,
    pub shard: String,
    pub tablet_type: TabletType,
    pub db_name_override: String,
    /// Free-form labels set by operators; never written by the agent
    pub tags: BTreeMap<String, String>,
}

impl Tablet {
    pub fn port(
        &self,
        name: &str,
    ) -> Option<u16> {
        self.port_map.get(name).copied()
    }

    pub fn mysql_port(&self) -> u16 {
        self.port(MYSQL_PORT_NAME).unwrap_or(0)
    }

    pub fn is_serving_type(&self) -> bool {
        self.tablet_type.is_serving_type()
    }

    /// Endpoint advertised in the serving-address directory.
    pub fn end_point(&self) -> Result<EndPoint, TopoError> {
        if self.hostname.is_empty() {
            return Err(TopoError::InvalidEndPoint(format!(
                "tablet {} has no hostname",
                self.alias
            )));
        }
        if !self.port_map.contains_key(VT_PORT_NAME) {
            return Err(TopoError::InvalidEndPoint(format!(
                "tablet {} has no {} port",
                self.alias, VT_PORT_NAME
            )));
        }
        Ok(EndPoint {
            uid: self.alias.uid,
            host: self.hostname.clone(),
            port_map: self.port_map.clone(),
        })
    }
}

/// Tablet record plus the store version it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TabletInfo {
    pub tablet: Tablet,
    pub version: u64,
}

impl TabletInfo {
    pub fn new(
        tablet: Tablet,
        version: u64,
    ) -> Self {
        Self { tablet, version }
    }
}

/// One entry of the serving-address directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPoint {
    pub uid: u32,
    pub host: String,
    pub port_map: BTreeMap<String, u16>,
}

/// Serving overrides attached to a tablet by an external controller.
///
/// Read-only for the agent and always replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TabletControl {
    pub blacklisted_tables: Vec<String>,
    pub disable_query_service: bool,
}
