//! Default timing and sizing constants for the coordinator.

/// Default TCP port the listener binds.
pub const PORT: u16 = 8080;

/// Minimum listen backlog the listener is configured with (must be `>= 3`).
pub const LISTEN_BACKLOG: u32 = 16;

/// Matcher cycle interval.
pub const MATCH_INTERVAL_MS: u64 = 1000;

/// Reaper sweep interval.
pub const REAP_INTERVAL_MS: u64 = 10_000;

/// Minimum time a drone must sit in DISCONNECTED before the reaper removes it.
pub const DISCONNECT_GRACE_MS: u64 = 5_000;

/// Interval advertised to clients in `HANDSHAKE_ACK.config.status_update_interval`.
pub const STATUS_UPDATE_INTERVAL_MS: u64 = 1000;

/// Interval advertised to clients in `HANDSHAKE_ACK.config.heartbeat_interval`.
pub const HEARTBEAT_INTERVAL_MS: u64 = 5000;

/// Mission expiry horizon, added to `now_ms()` when a mission is assigned.
pub const MISSION_EXPIRY_MS: u64 = 3_600_000;

/// Default registry capacity before handshakes start failing with `CAPACITY_EXCEEDED`.
pub const MAX_DRONES: usize = 1000;

/// Bounded time the supervisor waits for sessions to drain on shutdown.
pub const SHUTDOWN_DRAIN_MS: u64 = 2000;
