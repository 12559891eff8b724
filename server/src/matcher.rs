//! Drone/survivor matching (C5): one tick scans the world for IDLE drones
//! and WAITING survivors, pairs them by nearest Manhattan distance, and
//! commits each pairing as an atomic assignment transaction.
//!
//! The two strategies below are mutually exclusive at runtime (§4.5 Open
//! Question — resolved in DESIGN.md): the supervisor picks one
//! `MatchStrategy` at startup and runs it every tick.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use rescue_coord_shared::protocol::ServerMessage;
use rescue_coord_shared::{now_ms, Coord, DroneStatus, SurvivorStatus};

use crate::registry::{assign_if_idle, rollback_assignment, DroneCell};
use crate::world::World;

const MISSION_PRIORITY: &str = "high";

/// One proposed `(drone, survivor)` pairing, not yet committed.
pub struct Candidate {
    pub drone: Arc<DroneCell>,
    pub survivor_index: usize,
    pub target: Coord,
}

#[async_trait]
pub trait MatchStrategy: Send + Sync {
    /// Pair IDLE drones with WAITING survivors for one tick. Implementations
    /// must never return the same survivor index twice.
    async fn find_matches(&self, world: &World) -> Vec<Candidate>;
}

/// Default strategy: drones, in registration order, each claim their
/// nearest still-available survivor.
pub struct DroneCentric;

#[async_trait]
impl MatchStrategy for DroneCentric {
    async fn find_matches(&self, world: &World) -> Vec<Candidate> {
        let drones = world.registry.snapshot().await;
        let survivors = world.survivors.snapshot().await;
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut out = Vec::new();

        for drone in drones {
            let state = drone.state().await;
            if state.status != DroneStatus::Idle {
                continue;
            }

            let mut best: Option<(usize, i64)> = None;
            for (idx, survivor) in survivors.iter().enumerate() {
                if survivor.status != SurvivorStatus::Waiting || claimed.contains(&idx) {
                    continue;
                }
                let dist = state.coord.manhattan_distance(&survivor.coord);
                if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                    best = Some((idx, dist));
                }
            }

            if let Some((idx, _)) = best {
                claimed.insert(idx);
                out.push(Candidate {
                    target: survivors[idx].coord,
                    drone,
                    survivor_index: idx,
                });
            }
        }

        out
    }
}

/// Alternate strategy: survivors, in report order, each claim their
/// nearest still-available IDLE drone.
pub struct SurvivorCentric;

#[async_trait]
impl MatchStrategy for SurvivorCentric {
    async fn find_matches(&self, world: &World) -> Vec<Candidate> {
        let drones = world.registry.snapshot().await;
        let survivors = world.survivors.snapshot().await;

        let mut states = Vec::with_capacity(drones.len());
        for drone in &drones {
            states.push(drone.state().await);
        }

        let mut claimed: HashSet<usize> = HashSet::new();
        let mut out = Vec::new();

        for (idx, survivor) in survivors.iter().enumerate() {
            if survivor.status != SurvivorStatus::Waiting {
                continue;
            }

            let mut best: Option<(usize, i64)> = None;
            for (drone_idx, state) in states.iter().enumerate() {
                if state.status != DroneStatus::Idle || claimed.contains(&drone_idx) {
                    continue;
                }
                let dist = state.coord.manhattan_distance(&survivor.coord);
                if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                    best = Some((drone_idx, dist));
                }
            }

            if let Some((drone_idx, _)) = best {
                claimed.insert(drone_idx);
                out.push(Candidate {
                    drone: drones[drone_idx].clone(),
                    survivor_index: idx,
                    target: survivor.coord,
                });
            }
        }

        out
    }
}

/// Run one matching tick (C5): compute candidates, then commit each as an
/// atomic (drone, survivor) transaction (§4.5.1) — drone first, survivor
/// second, rolling back both on a failed `ASSIGN_MISSION` send.
pub async fn run_match_cycle(world: &World, strategy: &dyn MatchStrategy, mission_expiry_ms: u64) {
    let candidates = strategy.find_matches(world).await;

    for candidate in candidates {
        let Candidate {
            drone,
            survivor_index,
            target,
        } = candidate;
        let survivors = &world.survivors;

        let committed = assign_if_idle(&drone, target, || async {
            survivors.try_reserve(survivor_index).await
        })
        .await;
        if !committed {
            continue;
        }

        let mission_id = Uuid::new_v4().to_string();
        let msg = ServerMessage::AssignMission {
            mission_id: mission_id.clone(),
            priority: MISSION_PRIORITY.to_string(),
            target,
            expiry: now_ms() + mission_expiry_ms,
        };

        match drone.handle.send(&msg).await {
            Ok(n) => {
                world.counters.record_message_out();
                world.counters.add_bytes_out(n as u64);
                world.counters.record_mission_assigned();
            }
            Err(e) => {
                warn!(drone_id = drone.id.0, error = %e, "failed to send ASSIGN_MISSION, rolling back");
                rollback_assignment(&drone).await;
                survivors.release(survivor_index).await;
                continue;
            }
        }

        info!(drone_id = drone.id.0, mission_id = %mission_id, "mission assigned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use rescue_coord_shared::Map;

    fn live_handle() -> (SessionHandle, tokio::io::DuplexStream) {
        let (a, b) = tokio::io::duplex(4096);
        let (_reader, writer) = tokio::io::split(a);
        let handle = SessionHandle::from_writer("0.0.0.0:0".parse().unwrap(), Box::new(writer));
        (handle, b)
    }

    #[tokio::test]
    async fn drone_centric_picks_nearest_survivor() {
        let world = World::new(Map::new(100, 100), 10);
        let (near_handle, _near_peer) = live_handle();
        let (far_handle, _far_peer) = live_handle();

        world
            .registry
            .add(near_handle, Coord::new(0, 0), DroneStatus::Idle)
            .await
            .unwrap();
        world
            .registry
            .add(far_handle, Coord::new(50, 50), DroneStatus::Idle)
            .await
            .unwrap();

        world
            .survivors
            .add_survivor(&world.map, Coord::new(1, 1), "near")
            .await
            .unwrap();

        let candidates = DroneCentric.find_matches(&world).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].target, Coord::new(1, 1));
    }

    #[tokio::test]
    async fn run_match_cycle_commits_and_marks_both_sides() {
        let world = World::new(Map::new(100, 100), 10);
        let (handle, _peer) = live_handle();
        let cell = world
            .registry
            .add(handle, Coord::new(0, 0), DroneStatus::Idle)
            .await
            .unwrap();
        world
            .survivors
            .add_survivor(&world.map, Coord::new(0, 1), "")
            .await
            .unwrap();

        run_match_cycle(&world, &DroneCentric, 3_600_000).await;

        assert_eq!(cell.state().await.status, DroneStatus::OnMission);
        assert_eq!(world.survivors.counts().await.being_helped, 1);
    }

    #[tokio::test]
    async fn run_match_cycle_rolls_back_on_send_failure() {
        let world = World::new(Map::new(100, 100), 10);
        let dead_handle = crate::session::test_support::mock_handle();
        let cell = world
            .registry
            .add(dead_handle, Coord::new(0, 0), DroneStatus::Idle)
            .await
            .unwrap();
        world
            .survivors
            .add_survivor(&world.map, Coord::new(0, 1), "")
            .await
            .unwrap();

        run_match_cycle(&world, &DroneCentric, 3_600_000).await;

        assert_eq!(cell.state().await.status, DroneStatus::Idle);
        assert_eq!(world.survivors.counts().await.waiting, 1);
    }

    #[tokio::test]
    async fn no_idle_drones_yields_no_candidates() {
        let world = World::new(Map::new(100, 100), 10);
        let (handle, _peer) = live_handle();
        world
            .registry
            .add(handle, Coord::new(0, 0), DroneStatus::OnMission)
            .await
            .unwrap();
        world
            .survivors
            .add_survivor(&world.map, Coord::new(0, 1), "")
            .await
            .unwrap();

        let candidates = DroneCentric.find_matches(&world).await;
        assert!(candidates.is_empty());
    }
}
