//! Database daemon seam.
//!
//! The agent only needs two things from the daemon: its current listening
//! port (for the port drift check) and a way to close it on shutdown.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU16;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::DaemonError;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MysqlDaemon: Send + Sync + 'static {
    /// Port the daemon is listening on right now.
    async fn get_mysql_port(&self) -> Result<u16>;

    /// Releases connections held to the daemon.
    async fn close(&self);
}

/// Daemon handle whose port is known up front (or set later).
///
/// A port of 0 means the daemon has not reported one yet.
#[derive(Debug, Default)]
pub struct StaticMysqlDaemon {
    port: AtomicU16,
    closed: AtomicBool,
}

impl StaticMysqlDaemon {
    pub fn new(port: u16) -> Self {
        Self {
            port: AtomicU16::new(port),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulates the daemon restarting on another port.
    pub fn set_port(
        &self,
        port: u16,
    ) {
        self.port.store(port, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MysqlDaemon for StaticMysqlDaemon {
    async fn get_mysql_port(&self) -> Result<u16> {
        if self.is_closed() {
            return Err(DaemonError::Closed.into());
        }
        match self.port.load(Ordering::SeqCst) {
            0 => Err(DaemonError::PortUnavailable("mysqld has not reported a port".into()).into()),
            port => Ok(port),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("mysql daemon handle closed");
        }
    }
}
