//! Tablet agent error hierarchy
//!
//! Errors are grouped by the collaborator that produced them, so callers can
//! tell a topology-store problem from a database-daemon problem from a
//! violation of the agent's own protocol.

use std::time::Duration;

use config::ConfigError;

use crate::topo::TabletAlias;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Topology store failures (reads, read-modify-write updates, validation)
    #[error(transparent)]
    Topo(#[from] TopoError),

    /// Database daemon failures
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Agent protocol failures (refresh, lifecycle, action lock)
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local file system failures (log files)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TopoError {
    /// No record stored under the alias
    #[error("tablet {alias} not found in topology")]
    NotFound { alias: TabletAlias },

    /// Store unreachable or the request failed in transit
    #[error("topology store unavailable: {0}")]
    Unavailable(String),

    /// Consistency check between the alias and the stored views failed
    #[error("topology validation failed: {0}")]
    Validation(String),

    /// Record cannot be turned into a serving endpoint
    #[error("invalid endpoint: {0}")]
    InvalidEndPoint(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// The daemon could not report its listening port
    #[error("mysql port unavailable: {0}")]
    PortUnavailable(String),

    /// The daemon handle was already closed
    #[error("mysql daemon is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Re-reading the tablet after an action failed; the cache cannot be trusted
    #[error("Failed rereading tablet after {reason}: {source}")]
    RefreshFailed {
        reason: String,
        #[source]
        source: Box<Error>,
    },

    /// Hostname or IP resolution failed during registration
    #[error("cannot resolve {hostname}: {message}")]
    Resolve { hostname: String, message: String },

    /// The action lock could not be acquired in time
    #[error("action lock not acquired after {0:?}")]
    ActionLockTimeout(Duration),

    /// The state-change callback reported a failure
    #[error("state change callback failed: {0}")]
    Callback(String),

    /// Operation not allowed in the current lifecycle state
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidLifecycle { from: &'static str, to: &'static str },

    /// The agent has no cached tablet record yet
    #[error("tablet record is not loaded")]
    NotInitialized,
}

/// Outcome of the latest health check, stored in the state store.
///
/// `NotRunYet` is distinct from `Unhealthy` so that consumers can tell
/// "unknown" from "known unhealthy".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthError {
    #[error("healthcheck not run yet")]
    NotRunYet,

    #[error("unhealthy: {0}")]
    Unhealthy(String),
}
