//! TCP accept loop (C3): `listener.accept()` in a loop, each connection
//! handed to its own task tracked in a `JoinSet`, wrapped in a shutdown-aware
//! `select!` so the supervisor can stop accepting new connections and drain
//! every live session during a graceful shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::session;
use crate::world::World;

pub async fn run_listener(
    world: Arc<World>,
    config: Arc<ServerConfig>,
    shutdown: broadcast::Sender<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening for drone connections");

    let mut accept_shutdown = shutdown.subscribe();
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!(%addr, "accepted connection");
                        let world = world.clone();
                        let config = config.clone();
                        let session_shutdown = shutdown.subscribe();
                        sessions.spawn(async move {
                            session::run_session(stream, addr, world, config, session_shutdown).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed, continuing");
                    }
                }
            }
            _ = accept_shutdown.recv() => {
                info!("listener shutting down, no longer accepting new connections");
                break;
            }
        }
    }

    while sessions.join_next().await.is_some() {}

    Ok(())
}
