use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use crate::topo::TabletType;
use crate::HealthError;

/// Outcome of one health check, as kept for status pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthRecord {
    /// Milliseconds since the unix epoch
    pub time: u64,
    pub tablet_type: TabletType,
    pub replication_delay: Duration,
    pub error: Option<HealthError>,
}

/// Bounded ring of past health checks; the oldest record is evicted first.
#[derive(Debug)]
pub struct HealthHistory {
    records: Mutex<VecDeque<HealthRecord>>,
    capacity: usize,
}

impl HealthHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn add(
        &self,
        record: HealthRecord,
    ) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Snapshot ordered oldest to newest.
    pub fn records(&self) -> Vec<HealthRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<HealthRecord> {
        self.records.lock().back().cloned()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
