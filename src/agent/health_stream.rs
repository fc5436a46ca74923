//! Health Stream Broadcaster
//!
//! Fan-out of health snapshots to a dynamic set of subscribers.
//!
//! - Handles come from a monotonically increasing counter and are never reused.
//! - Delivery uses `try_send`: a full subscriber channel loses that one reply,
//!   a closed one is removed from the registry.
//! - The registry has its own lock, independent from the state store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use tracing::trace;

use crate::metrics::HEALTH_STREAM_DROPPED;
use crate::metrics::HEALTH_STREAM_SUBSCRIBERS;
use crate::topo::Tablet;
use crate::HealthError;

/// Point-in-time health snapshot sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStreamReply {
    pub tablet: Tablet,
    pub replication_delay: Duration,
    /// `None` when healthy
    pub health_error: Option<HealthError>,
}

/// Receiving side of one registration.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<Arc<HealthStreamReply>>,
}

impl Subscription {
    pub fn into_stream(self) -> ReceiverStream<Arc<HealthStreamReply>> {
        ReceiverStream::new(self.receiver)
    }
}

#[derive(Debug, Default)]
struct Registry {
    subscribers: HashMap<u64, mpsc::Sender<Arc<HealthStreamReply>>>,
    next_id: u64,
}

#[derive(Debug)]
pub struct HealthStreamBroadcaster {
    registry: Mutex<Registry>,
    buffer_size: usize,
}

impl HealthStreamBroadcaster {
    /// `buffer_size` is the capacity of channels created by [`Self::subscribe`].
    pub fn new(buffer_size: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Registers a caller-owned channel and returns its handle.
    pub fn register(
        &self,
        sender: mpsc::Sender<Arc<HealthStreamReply>>,
    ) -> u64 {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, sender);
        HEALTH_STREAM_SUBSCRIBERS.set(registry.subscribers.len() as i64);
        debug!(subscriber_id = id, "health stream subscriber registered");
        id
    }

    /// Creates a bounded channel, registers it and hands back the receiving half.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let id = self.register(tx);
        Subscription { id, receiver: rx }
    }

    /// Returns false if `id` was not registered.
    pub fn unsubscribe(
        &self,
        id: u64,
    ) -> bool {
        let mut registry = self.registry.lock();
        let removed = registry.subscribers.remove(&id).is_some();
        HEALTH_STREAM_SUBSCRIBERS.set(registry.subscribers.len() as i64);
        if removed {
            debug!(subscriber_id = id, "health stream subscriber unregistered");
        }
        removed
    }

    /// Delivers `reply` to every registered subscriber without blocking.
    ///
    /// Returns the number of subscribers that accepted the reply.
    pub fn broadcast(
        &self,
        reply: HealthStreamReply,
    ) -> usize {
        let reply = Arc::new(reply);
        let mut registry = self.registry.lock();
        let mut delivered = 0;

        registry.subscribers.retain(|id, sender| match sender.try_send(reply.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                trace!(subscriber_id = id, "health stream channel full, reply dropped");
                HEALTH_STREAM_DROPPED.inc();
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber_id = id, "health stream receiver gone, removing");
                false
            }
        });

        HEALTH_STREAM_SUBSCRIBERS.set(registry.subscribers.len() as i64);
        delivered
    }

    /// Number of registered subscribers.
    pub fn size(&self) -> usize {
        self.registry.lock().subscribers.len()
    }
}
