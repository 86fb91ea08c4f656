//! Flow Export Holding Buffer
//!
//! Fixed-capacity ring that holds subscriber flow records between exports.
//! When the ring is full the oldest record is overwritten, so a stalled
//! exporter loses history rather than memory.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Capacity used when a buffer is created with capacity 0
pub const DEFAULT_FLOW_BUFFER_CAPACITY: usize = 10_000;

/// One exported flow record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEntry {
    pub subscriber_id: String,
    pub source_ip: String,
    pub destination_ip: String,
    pub source_port: u16,
    pub destination_port: u16,
    /// IP protocol number
    pub protocol: u8,
    pub packets: u64,
    pub bytes: u64,
    /// RFC 3339 timestamp
    pub start_time: String,
    /// RFC 3339 timestamp
    pub end_time: String,
}

struct Ring {
    slots: Vec<Option<FlowEntry>>,
    /// Index of the oldest entry
    head: usize,
    len: usize,
}

/// Thread-safe ring of [`FlowEntry`]
pub struct FlowBuffer {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl FlowBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_FLOW_BUFFER_CAPACITY
        } else {
            capacity
        };

        Self {
            capacity,
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                len: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, overwriting the oldest one when full
    pub fn enqueue(&self, entry: FlowEntry) {
        let mut ring = match self.ring.lock() {
            Ok(ring) => ring,
            Err(poisoned) => poisoned.into_inner(),
        };

        let tail = (ring.head + ring.len) % self.capacity;
        ring.slots[tail] = Some(entry);

        if ring.len == self.capacity {
            ring.head = (ring.head + 1) % self.capacity;
            log::trace!("Flow buffer full, dropped oldest entry");
        } else {
            ring.len += 1;
        }
    }

    /// Take every held entry, oldest first, leaving the buffer empty
    pub fn drain(&self) -> Vec<FlowEntry> {
        let mut ring = match self.ring.lock() {
            Ok(ring) => ring,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut entries = Vec::with_capacity(ring.len);
        for i in 0..ring.len {
            let idx = (ring.head + i) % self.capacity;
            if let Some(entry) = ring.slots[idx].take() {
                entries.push(entry);
            }
        }
        ring.head = 0;
        ring.len = 0;

        entries
    }

    pub fn len(&self) -> usize {
        match self.ring.lock() {
            Ok(ring) => ring.len,
            Err(poisoned) => poisoned.into_inner().len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FlowBuffer {
    fn default() -> Self {
        Self::new(0)
    }
}
