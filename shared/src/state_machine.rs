//! Drone status transition rules: a small `(from, to) -> bool` table for
//! the three statuses a drone can hold: `IDLE`, `ON_MISSION`,
//! `DISCONNECTED`.

use crate::DroneStatus;

/// Is `from -> to` a legal status transition?
///
/// - `IDLE <-> ON_MISSION` only happens through the matcher (assignment)
///   and mission completion respectively.
/// - Any state can transition to `DISCONNECTED`, and it is terminal: there
///   is no legal transition out of it (the id is retired, not reused).
pub fn is_valid_transition(from: DroneStatus, to: DroneStatus) -> bool {
    use DroneStatus::*;

    match (from, to) {
        (a, b) if a == b => true,
        (Disconnected, _) => false,
        (_, Disconnected) => true,
        (Idle, OnMission) => true,
        (OnMission, Idle) => true,
        _ => false,
    }
}
