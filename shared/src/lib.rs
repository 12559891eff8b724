//! Shared protocol types and wire codec for the rescue drone coordinator.
//!
//! This crate provides the types that the `server` crate and any external
//! collaborator (drone simulator, survivor generator, renderer) need to
//! agree on: the coordinate/map model, the drone and survivor status
//! enums, the newline-delimited JSON wire messages, and the streaming
//! frame codec that turns a byte stream into individual messages.

pub mod codec;
pub mod defaults;
pub mod map;
pub mod protocol;
pub mod state_machine;

pub use map::{Coord, Map};
pub use protocol::{
    ClientMessage, DroneStatus, HandshakePayload, HeartbeatResponsePayload,
    MissionCompletePayload, ServerMessage, StatusUpdatePayload, SurvivorStatus,
};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used only for values that travel on the wire (e.g. a mission `expiry`);
/// internal freshness checks (`last_update`, the reaper's grace period)
/// use `std::time::Instant` instead so they stay immune to clock skew.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
