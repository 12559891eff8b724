//! Concurrent drone registry (C2): an `RwLock<HashMap<...>>` of entries,
//! written only for structural changes (`add`/`remove`), read for lookups
//! and iteration. Adds:
//! - a capacity check at insertion (`CAPACITY_EXCEEDED`, §4.1),
//! - monotonically increasing ids that double as an insertion-order key,
//!   so a `snapshot()` can be handed back as an owned `Vec` sorted by id
//!   without maintaining a second ordering structure,
//! - a per-drone `Mutex` (the "drone handle" of §5's locking order) instead
//!   of locking the whole map for per-drone mutation,
//! - every status mutation checked against `state_machine::is_valid_transition`
//!   so DISCONNECTED stays terminal regardless of what arrives after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use rescue_coord_shared::state_machine::is_valid_transition;
use rescue_coord_shared::{Coord, DroneStatus};

use crate::session::SessionHandle;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry capacity exceeded")]
    CapacityExceeded,
}

/// Unique, never-reused drone identifier, assigned monotonically at
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DroneId(pub u64);

/// The mutable part of a drone's record. Cloned out under the cell's own
/// lock, never held across an `.await` for I/O.
#[derive(Debug, Clone, Copy)]
pub struct DroneState {
    pub status: DroneStatus,
    pub coord: Coord,
    pub target: Coord,
    pub last_update: Instant,
}

/// One drone's registration: a stable identity plus its own serialization
/// handle ("the drone handle" in §5's invariant table) and a handle to
/// send it outbound messages.
pub struct DroneCell {
    pub id: DroneId,
    pub handle: SessionHandle,
    state: Mutex<DroneState>,
}

impl DroneCell {
    fn new(id: DroneId, handle: SessionHandle, coord: Coord, status: DroneStatus) -> Self {
        Self {
            id,
            handle,
            state: Mutex::new(DroneState {
                status,
                coord,
                target: coord,
                last_update: Instant::now(),
            }),
        }
    }

    pub async fn state(&self) -> DroneState {
        *self.state.lock().await
    }

    /// Apply a `STATUS_UPDATE`: new coord/status, refreshed `last_update`.
    /// A no-op (returns `false`) if `status` is not a valid transition from
    /// the drone's current status — e.g. a stray message arriving after
    /// DISCONNECTED, which is terminal.
    pub async fn update_status(&self, coord: Coord, status: DroneStatus) -> bool {
        let mut s = self.state.lock().await;
        if !is_valid_transition(s.status, status) {
            return false;
        }
        s.coord = coord;
        s.status = status;
        s.last_update = Instant::now();
        true
    }

    pub async fn refresh_heartbeat(&self) {
        self.state.lock().await.last_update = Instant::now();
    }

    pub async fn mark_disconnected(&self) {
        let mut s = self.state.lock().await;
        s.status = DroneStatus::Disconnected;
        s.last_update = Instant::now();
    }

    /// Mission-complete handling (§4.6 step 1): set IDLE and return the
    /// resolved target (preferring an embedded `target_location`). Returns
    /// `None` without changing state if IDLE is not a valid transition
    /// from the drone's current status (e.g. it already DISCONNECTED).
    pub async fn complete_mission(&self, reported_target: Option<Coord>) -> Option<Coord> {
        let mut s = self.state.lock().await;
        if !is_valid_transition(s.status, DroneStatus::Idle) {
            return None;
        }
        let target = reported_target.unwrap_or(s.target);
        s.status = DroneStatus::Idle;
        s.target = s.coord;
        s.last_update = Instant::now();
        Some(target)
    }

    /// Assignment transaction step on the drone side (§4.5.1): only
    /// succeeds if the drone is still IDLE.
    async fn try_assign(&self, target: Coord) -> bool {
        let mut s = self.state.lock().await;
        if s.status != DroneStatus::Idle {
            return false;
        }
        s.status = DroneStatus::OnMission;
        s.target = target;
        s.last_update = Instant::now();
        true
    }

    async fn rollback_assign(&self) {
        let mut s = self.state.lock().await;
        if s.status == DroneStatus::OnMission {
            s.status = DroneStatus::Idle;
            s.target = s.coord;
        }
    }
}

/// The concurrent, bounded, ordered-insertion drone collection (C2).
pub struct Registry {
    entries: RwLock<HashMap<DroneId, Arc<DroneCell>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Register a new drone. Fails with `CapacityExceeded` once `capacity`
    /// live entries are held; never overwrites or reuses an id.
    pub async fn add(
        &self,
        handle: SessionHandle,
        coord: Coord,
        status: DroneStatus,
    ) -> Result<Arc<DroneCell>, RegistryError> {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded);
        }
        let id = DroneId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let cell = Arc::new(DroneCell::new(id, handle, coord, status));
        entries.insert(id, cell.clone());
        Ok(cell)
    }

    /// Idempotent: removing an id that is absent is a no-op.
    pub async fn remove(&self, id: DroneId) {
        self.entries.write().await.remove(&id);
    }

    pub async fn get(&self, id: DroneId) -> Option<Arc<DroneCell>> {
        self.entries.read().await.get(&id).cloned()
    }

    /// A stable, owned view for iteration, in registration order. Already-
    /// cloned `Arc<DroneCell>` entries stay valid to dereference for as
    /// long as the caller holds the returned `Vec`, regardless of
    /// concurrent `add`/`remove` calls that happen afterwards.
    pub async fn snapshot(&self) -> Vec<Arc<DroneCell>> {
        let entries = self.entries.read().await;
        let mut v: Vec<_> = entries.values().cloned().collect();
        drop(entries);
        v.sort_by_key(|cell| cell.id.0);
        v
    }

    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// The atomic (drone, survivor) assignment transaction (§4.5.1).
///
/// Acquires the drone's own handle first, then (inside `reserve`) the
/// survivor-set handle — never the reverse, and never two drone handles
/// at once. `reserve` is expected to attempt `SurvivorSet::try_reserve`.
pub async fn assign_if_idle<F, Fut>(drone: &DroneCell, target: Coord, reserve: F) -> bool
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    if !drone.try_assign(target).await {
        return false;
    }
    if reserve().await {
        true
    } else {
        drone.rollback_assign().await;
        false
    }
}

/// Roll back a successful assignment after an outbound send failed.
pub async fn rollback_assignment(drone: &DroneCell) {
    drone.rollback_assign().await;
}
