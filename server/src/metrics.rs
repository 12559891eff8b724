//! Counter-style metrics (§1 ambient stack, §6 "Metrics sink" collaborator).
//!
//! The core never depends on a sink being attached: it just increments
//! plain atomics on its own hot paths and exposes a `snapshot()` an
//! external metrics logger can poll. No network export, no dependency on
//! any particular metrics backend — that integration belongs to the
//! out-of-scope "throughput/metrics logger" collaborator (§1).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counters {
    pub connections_up: AtomicU64,
    pub connections_down: AtomicU64,
    pub messages_in: AtomicU64,
    pub messages_out: AtomicU64,
    pub bytes_in: AtomicU64,
    pub bytes_out: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub missions_assigned: AtomicU64,
    pub missions_completed: AtomicU64,
}

/// A point-in-time copy, cheap to serialize or log.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountersSnapshot {
    pub connections_up: u64,
    pub connections_down: u64,
    pub messages_in: u64,
    pub messages_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub protocol_errors: u64,
    pub missions_assigned: u64,
    pub missions_completed: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            connections_up: self.connections_up.load(Ordering::Relaxed),
            connections_down: self.connections_down.load(Ordering::Relaxed),
            messages_in: self.messages_in.load(Ordering::Relaxed),
            messages_out: self.messages_out.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            missions_assigned: self.missions_assigned.load(Ordering::Relaxed),
            missions_completed: self.missions_completed.load(Ordering::Relaxed),
        }
    }

    pub fn record_connection_up(&self) {
        self.connections_up.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_down(&self) {
        self.connections_down.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_in(&self) {
        self.messages_in.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_out(&self) {
        self.messages_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_in(&self, n: u64) {
        self.bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_bytes_out(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mission_assigned(&self) {
        self.missions_assigned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mission_completed(&self) {
        self.missions_completed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let counters = Counters::new();
        counters.record_connection_up();
        counters.record_message_in();
        counters.add_bytes_in(128);
        counters.record_protocol_error();

        let snap = counters.snapshot();
        assert_eq!(snap.connections_up, 1);
        assert_eq!(snap.messages_in, 1);
        assert_eq!(snap.bytes_in, 128);
        assert_eq!(snap.protocol_errors, 1);
    }
}
