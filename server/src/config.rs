//! Server configuration.
//!
//! Deliberately a plain struct with a `Default` impl rather than a CLI
//! parser: argument/file parsing is an external collaborator's job
//! (§1/§6), the core only needs somewhere to receive the handful of
//! values it actually consumes.

use rescue_coord_shared::defaults;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub map_height: i32,
    pub map_width: i32,
    pub max_drones: usize,
    pub match_interval_ms: u64,
    pub reap_interval_ms: u64,
    pub disconnect_grace_ms: u64,
    pub status_update_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", defaults::PORT),
            map_height: 100,
            map_width: 100,
            max_drones: defaults::MAX_DRONES,
            match_interval_ms: defaults::MATCH_INTERVAL_MS,
            reap_interval_ms: defaults::REAP_INTERVAL_MS,
            disconnect_grace_ms: defaults::DISCONNECT_GRACE_MS,
            status_update_interval_ms: defaults::STATUS_UPDATE_INTERVAL_MS,
            heartbeat_interval_ms: defaults::HEARTBEAT_INTERVAL_MS,
        }
    }
}
