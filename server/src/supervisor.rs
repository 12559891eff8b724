//! Startup and shutdown orchestration (C7).
//!
//! A `Supervisor` centralizes startup order and graceful shutdown: the
//! registry is already live the moment `World` is constructed, then the
//! listener, matcher, and reaper are started in that order, and all three
//! are handed a clone of one `broadcast` shutdown channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use rescue_coord_shared::{defaults, Map};

use crate::config::ServerConfig;
use crate::listener;
use crate::matcher::{self, MatchStrategy};
use crate::reaper;
use crate::world::World;

pub struct Supervisor {
    world: Arc<World>,
    config: Arc<ServerConfig>,
    strategy: Box<dyn MatchStrategy>,
}

/// Join handles plus the shutdown sender, returned by `Supervisor::spawn`
/// so callers (including tests) can trigger and await a clean stop
/// without going through `tokio::signal::ctrl_c`.
pub struct SupervisorHandles {
    pub listener: JoinHandle<()>,
    pub matcher: JoinHandle<()>,
    pub reaper: JoinHandle<()>,
    pub shutdown: broadcast::Sender<()>,
}

impl Supervisor {
    pub fn new(config: ServerConfig, strategy: Box<dyn MatchStrategy>) -> Self {
        let map = Map::new(config.map_height, config.map_width);
        let world = Arc::new(World::new(map, config.max_drones));
        Self {
            world,
            config: Arc::new(config),
            strategy,
        }
    }

    pub fn world(&self) -> Arc<World> {
        self.world.clone()
    }

    /// Start the listener, matcher, and reaper tasks, in that order. The
    /// registry and survivor set inside `World` are already usable before
    /// this is called — there is nothing to "start" for them, they just
    /// exist.
    pub fn spawn(self) -> SupervisorHandles {
        let (shutdown_tx, _) = broadcast::channel(1);

        let listener_world = self.world.clone();
        let listener_config = self.config.clone();
        let listener_shutdown = shutdown_tx.clone();
        let listener_task = tokio::spawn(async move {
            if let Err(e) =
                listener::run_listener(listener_world, listener_config, listener_shutdown).await
            {
                error!(error = %e, "listener task exited with error");
            }
        });

        let matcher_world = self.world.clone();
        let strategy = self.strategy;
        let match_interval_ms = self.config.match_interval_ms;
        let mut matcher_shutdown = shutdown_tx.subscribe();
        let matcher_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(match_interval_ms));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        matcher::run_match_cycle(&matcher_world, strategy.as_ref(), defaults::MISSION_EXPIRY_MS).await;
                    }
                    _ = matcher_shutdown.recv() => {
                        info!("matcher shutting down");
                        break;
                    }
                }
            }
        });

        let reaper_world = self.world.clone();
        let reap_interval_ms = self.config.reap_interval_ms;
        let grace = Duration::from_millis(self.config.disconnect_grace_ms);
        let reaper_shutdown = shutdown_tx.subscribe();
        let reaper_task = tokio::spawn(reaper::run_reaper(
            reaper_world,
            reap_interval_ms,
            grace,
            reaper_shutdown,
        ));

        SupervisorHandles {
            listener: listener_task,
            matcher: matcher_task,
            reaper: reaper_task,
            shutdown: shutdown_tx,
        }
    }

    /// Run until `ctrl_c`, then shut down gracefully.
    pub async fn run_until_ctrl_c(self) -> anyhow::Result<()> {
        let handles = self.spawn();
        tokio::signal::ctrl_c().await?;
        info!("shutdown signal received");
        shutdown_gracefully(handles).await
    }
}

/// Broadcast the shutdown signal and wait (bounded by
/// `SHUTDOWN_DRAIN_MS`) for all three tasks to finish.
pub async fn shutdown_gracefully(handles: SupervisorHandles) -> anyhow::Result<()> {
    let _ = handles.shutdown.send(());

    let drain = Duration::from_millis(defaults::SHUTDOWN_DRAIN_MS);
    let joined = tokio::time::timeout(drain, async {
        let _ = handles.listener.await;
        let _ = handles.matcher.await;
        let _ = handles.reaper.await;
    })
    .await;

    if joined.is_err() {
        warn!("shutdown drain period elapsed before all tasks finished");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DroneCentric;

    #[tokio::test]
    async fn spawn_and_shutdown_completes_within_drain_period() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..ServerConfig::default()
        };
        let supervisor = Supervisor::new(config, Box::new(DroneCentric));
        let handles = supervisor.spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_gracefully(handles).await.unwrap();
    }
}
