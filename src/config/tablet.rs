use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::topo::TabletAlias;
use crate::topo::TabletType;
use crate::Error;
use crate::Result;

/// Identity and network facts this agent publishes for its tablet.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TabletConfig {
    /// Cell the tablet lives in
    #[serde(default = "default_cell")]
    pub cell: String,

    /// Numeric tablet id, unique within the cell
    #[serde(default = "default_uid")]
    pub uid: u32,

    /// If not empty, this hostname is assumed instead of resolving it
    #[serde(default)]
    pub hostname: String,

    /// Query service port ("vt")
    #[serde(default = "default_vt_port")]
    pub vt_port: u16,

    /// Secure query service port ("vts"), 0 removes it from the port map
    #[serde(default)]
    pub vts_port: u16,

    /// MySQL port, 0 means unknown: ask the daemon, then leave the stored value alone
    #[serde(default)]
    pub mysql_port: u16,

    /// Tablet type the tablet is expected to run as
    #[serde(default = "default_target_tablet_type")]
    pub target_tablet_type: TabletType,

    /// Keyspace used when seeding a standalone topology
    #[serde(default)]
    pub keyspace: String,

    /// Shard used when seeding a standalone topology
    #[serde(default)]
    pub shard: String,
}

impl Default for TabletConfig {
    fn default() -> Self {
        Self {
            cell: default_cell(),
            uid: default_uid(),
            hostname: String::new(),
            vt_port: default_vt_port(),
            vts_port: 0,
            mysql_port: 0,
            target_tablet_type: default_target_tablet_type(),
            keyspace: String::new(),
            shard: String::new(),
        }
    }
}

impl TabletConfig {
    pub fn alias(&self) -> TabletAlias {
        TabletAlias::new(&self.cell, self.uid)
    }

    /// Validates tablet identity and ports
    /// # Errors
    /// Returns `Error::Config` if the alias or the query port is unusable
    pub fn validate(&self) -> Result<()> {
        if self.cell.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "tablet.cell cannot be empty".into(),
            )));
        }

        if self.cell.contains('-') {
            return Err(Error::Config(ConfigError::Message(format!(
                "tablet.cell {} cannot contain '-'",
                self.cell
            ))));
        }

        if self.vt_port == 0 {
            return Err(Error::Config(ConfigError::Message(
                "tablet.vt_port must be non-zero".into(),
            )));
        }

        if self.vts_port != 0 && self.vts_port == self.vt_port {
            return Err(Error::Config(ConfigError::Message(format!(
                "tablet.vts_port {} conflicts with tablet.vt_port",
                self.vts_port
            ))));
        }

        Ok(())
    }
}

fn default_cell() -> String {
    "cell1".to_string()
}
fn default_uid() -> u32 {
    100
}
fn default_vt_port() -> u16 {
    15000
}
fn default_target_tablet_type() -> TabletType {
    TabletType::Replica
}
