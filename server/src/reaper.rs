//! Disconnect reaping (C6): periodically sweep the registry and remove
//! drones that have sat in DISCONNECTED for longer than the configured
//! grace period.
//!
//! DISCONNECTED is only ever set by a session's own read-error/EOF path
//! (`cell.mark_disconnected()` in session/mod.rs, §4.4.5) or by a session
//! entering CLOSING on shutdown. The reaper never manufactures that state
//! from a liveness timeout — it only removes entries already in it
//! (§4.7): a drone that simply hasn't sent anything in a while is still
//! connected and must be left alone.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use rescue_coord_shared::DroneStatus;

use crate::world::World;

/// One reap pass: remove every DISCONNECTED drone that has held that
/// status for longer than `grace`. Returns the number of entries removed.
pub async fn reap_once(world: &World, grace: Duration) -> usize {
    let snapshot = world.registry.snapshot().await;
    let mut removed = 0;

    for cell in &snapshot {
        let state = cell.state().await;
        if state.status == DroneStatus::Disconnected
            && Instant::now().saturating_duration_since(state.last_update) > grace
        {
            world.registry.remove(cell.id).await;
            removed += 1;
        }
    }

    if removed > 0 {
        info!(removed, "reaped disconnected drones");
    }
    removed
}

/// Run the reap loop until `shutdown` fires (C7's shutdown signal).
pub async fn run_reaper(
    world: Arc<World>,
    interval_ms: u64,
    grace: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                reap_once(&world, grace).await;
            }
            _ = shutdown.recv() => {
                info!("reaper shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescue_coord_shared::{Coord, Map};

    #[tokio::test]
    async fn reap_once_removes_disconnected_drones_past_grace() {
        let world = World::new(Map::new(10, 10), 10);
        let handle = crate::session::test_support::mock_handle();
        let cell = world
            .registry
            .add(handle, Coord::new(0, 0), DroneStatus::Idle)
            .await
            .unwrap();
        cell.mark_disconnected().await;

        tokio::time::sleep(Duration::from_millis(1)).await;
        let removed = reap_once(&world, Duration::from_millis(0)).await;
        assert_eq!(removed, 1);
        assert_eq!(world.registry.size().await, 0);
    }

    #[tokio::test]
    async fn reap_once_leaves_live_drones_alone_regardless_of_age() {
        let world = World::new(Map::new(10, 10), 10);
        let handle = crate::session::test_support::mock_handle();
        world
            .registry
            .add(handle, Coord::new(0, 0), DroneStatus::Idle)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1)).await;
        let removed = reap_once(&world, Duration::from_millis(0)).await;
        assert_eq!(removed, 0);
        assert_eq!(world.registry.size().await, 1);
    }

    #[tokio::test]
    async fn reap_once_leaves_disconnected_drones_within_grace_period() {
        let world = World::new(Map::new(10, 10), 10);
        let handle = crate::session::test_support::mock_handle();
        let cell = world
            .registry
            .add(handle, Coord::new(0, 0), DroneStatus::Idle)
            .await
            .unwrap();
        cell.mark_disconnected().await;

        let removed = reap_once(&world, Duration::from_secs(5)).await;
        assert_eq!(removed, 0);
        assert_eq!(world.registry.size().await, 1);
    }
}
