//! Per-node control-plane agent for a single tablet.
//!
//! The agent keeps the authoritative in-memory copy of the tablet record,
//! keeps the shared topology store in sync with local reality (hostname, IP,
//! port map, serving eligibility), dispatches a state-change callback on
//! every transition, and streams health snapshots to subscribers without
//! ever blocking on a slow one.
//!
//! ## Locking
//! Locks are always acquired in this order:
//! 1. the action lock ([`ActionAgent::run_action`]), held across topology round trips;
//! 2. the dispatch lock ([`StateChangeDispatcher`]), held while the callback runs;
//! 3. the state-store lock ([`TabletState`]), held for a single get/set only.
//!
//! The health-stream lock ([`HealthStreamBroadcaster`]) is independent and
//! never nested with the state-store lock. Health checks are serialized by
//! their own lock and never take the action lock.

pub mod agent;
pub mod config;
pub mod metrics;
pub mod mysqld;
pub mod services;
pub mod topo;
pub mod utils;

mod errors;

pub use agent::*;
pub use errors::*;

//-----------------------------------------------------------
// Autometrics
/// autometrics: https://docs.autometrics.dev/rust/adding-alerts-and-slos
use autometrics::objectives::Objective;
use autometrics::objectives::ObjectiveLatency;
use autometrics::objectives::ObjectivePercentile;
const API_SLO: Objective = Objective::new("tablet_agent")
    .success_rate(ObjectivePercentile::P99_9)
    .latency(ObjectiveLatency::Ms250, ObjectivePercentile::P99);
