//! World state (C1): the map bounds plus the two collections the matcher
//! reads and writes every tick — the drone registry and the survivor set.
//!
//! `SurvivorSet` uses the same locking shape as the session registry: one
//! `Mutex` around a `Vec`, written for structural changes and status
//! transitions, snapshotted for read-mostly scans. Survivors don't get
//! their own per-entry lock the way drones do (`DroneCell`) because the
//! matcher's survivor-side critical section is already tiny (`try_reserve`
//! flips one status field).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use rescue_coord_shared::{Coord, Map, SurvivorStatus};

use crate::metrics::Counters;
use crate::registry::Registry;

/// One survivor report, as held by the coordinator.
#[derive(Debug, Clone)]
pub struct Survivor {
    pub coord: Coord,
    pub status: SurvivorStatus,
    pub discovered_at: Instant,
    pub helped_at: Option<Instant>,
    pub info: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SurvivorCounts {
    pub waiting: usize,
    pub being_helped: usize,
    pub rescued: usize,
    pub archived: usize,
}

#[derive(Debug)]
pub enum WorldError {
    OutOfBounds,
}

/// The collection of known survivors, in report order. Indices are stable
/// for the lifetime of an entry: survivors are archived, never removed,
/// so an index handed out by `add_survivor` stays valid.
pub struct SurvivorSet {
    entries: Mutex<Vec<Survivor>>,
}

impl SurvivorSet {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record a new survivor report (§4.2). Rejects out-of-bounds coords
    /// rather than clamping them.
    pub async fn add_survivor(
        &self,
        map: &Map,
        coord: Coord,
        info: impl Into<String>,
    ) -> Result<usize, WorldError> {
        if !map.contains(&coord) {
            return Err(WorldError::OutOfBounds);
        }
        let mut entries = self.entries.lock().await;
        entries.push(Survivor {
            coord,
            status: SurvivorStatus::Waiting,
            discovered_at: Instant::now(),
            helped_at: None,
            info: info.into(),
        });
        Ok(entries.len() - 1)
    }

    /// An owned snapshot for the matcher's scan and for status reporting.
    pub async fn snapshot(&self) -> Vec<Survivor> {
        self.entries.lock().await.clone()
    }

    pub async fn counts(&self) -> SurvivorCounts {
        let entries = self.entries.lock().await;
        let mut counts = SurvivorCounts::default();
        for s in entries.iter() {
            match s.status {
                SurvivorStatus::Waiting => counts.waiting += 1,
                SurvivorStatus::BeingHelped => counts.being_helped += 1,
                SurvivorStatus::Rescued => counts.rescued += 1,
                SurvivorStatus::Archived => counts.archived += 1,
            }
        }
        counts
    }

    /// Assignment transaction step (§4.5.1), held while the drone side of
    /// the transaction is already committed: reserve the survivor at
    /// `index` only if it is still WAITING.
    pub async fn try_reserve(&self, index: usize) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(index) {
            Some(s) if s.status == SurvivorStatus::Waiting => {
                s.status = SurvivorStatus::BeingHelped;
                true
            }
            _ => false,
        }
    }

    /// Roll back a reservation after the outbound `ASSIGN_MISSION` send
    /// failed.
    pub async fn release(&self, index: usize) {
        let mut entries = self.entries.lock().await;
        if let Some(s) = entries.get_mut(index) {
            if s.status == SurvivorStatus::BeingHelped {
                s.status = SurvivorStatus::Waiting;
            }
        }
    }

    /// Mission-complete reconciliation (§4.6 step 2): the first
    /// BEING_HELPED survivor at `target`, in report order, is marked
    /// RESCUED. Returns whether one was found.
    pub async fn reconcile_complete(&self, target: Coord) -> bool {
        let mut entries = self.entries.lock().await;
        for s in entries.iter_mut() {
            if s.status == SurvivorStatus::BeingHelped && s.coord == target {
                s.status = SurvivorStatus::Rescued;
                s.helped_at = Some(Instant::now());
                return true;
            }
        }
        false
    }
}

impl Default for SurvivorSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the matcher, reaper, and sessions need a shared view of.
pub struct World {
    pub map: Map,
    pub registry: Registry,
    pub survivors: SurvivorSet,
    /// `Arc`-wrapped separately from `World` itself so a session can hold
    /// a counters handle without holding a cyclic reference back through
    /// `Registry` to `World`.
    pub counters: Arc<Counters>,
}

impl World {
    pub fn new(map: Map, capacity: usize) -> Self {
        Self {
            map,
            registry: Registry::new(capacity),
            survivors: SurvivorSet::new(),
            counters: Arc::new(Counters::new()),
        }
    }
}
