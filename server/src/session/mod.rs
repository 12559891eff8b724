//! Per-connection session handling (C4): the `AWAITING_HANDSHAKE -> READY ->
//! CLOSING` state machine for one drone's TCP connection, implemented as
//! `await_handshake` followed by a `select!`-driven READY read loop that
//! also watches the supervisor's shutdown broadcast. CLOSING is that
//! loop's exit: no further reads are issued, the drone is marked
//! DISCONNECTED, and the socket closes when `run_session` returns and
//! drops it.
//!
//! A cloneable `SessionHandle` wraps the write half behind a `Mutex` so
//! the matcher and the session's own read loop can both send without
//! coordinating, while `DroneSession` owns the read half plus a
//! `FrameDecoder`. The write half is boxed behind `dyn AsyncWrite` rather
//! than a concrete `WriteHalf<TcpStream>` so tests can hand it a
//! `tokio::io::duplex` pair instead of a real socket.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use rescue_coord_shared::codec::{self, CodecError, FrameDecoder};
use rescue_coord_shared::protocol::{
    parse_handshake_status, parse_status_update_status, ClientMessage, HandshakeConfig,
    ServerMessage,
};

use crate::config::ServerConfig;
use crate::registry::{DroneCell, DroneId, RegistryError};
use crate::world::World;

pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// A cloneable handle for sending this drone outbound messages. Safe to
/// hold from the matcher, the reaper, or the session's own read loop at
/// the same time; each `send` takes the write-half lock for the duration
/// of one frame only.
#[derive(Clone)]
pub struct SessionHandle {
    pub addr: SocketAddr,
    writer: Arc<Mutex<BoxedWriter>>,
}

impl SessionHandle {
    /// Build a handle around any boxed async writer. `pub(crate)` rather
    /// than fully private so tests elsewhere in this crate can back a
    /// handle with an in-memory pipe instead of a real socket.
    pub(crate) fn from_writer(addr: SocketAddr, writer: BoxedWriter) -> Self {
        Self {
            addr,
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Encode and write `msg`, returning the number of bytes written so
    /// callers can feed it into `Counters::add_bytes_out`.
    pub async fn send(&self, msg: &ServerMessage) -> Result<usize, CodecError> {
        let encoded = codec::encode(msg)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await?;
        Ok(encoded.len())
    }
}

/// The read side of a drone connection: owns the socket's read half and
/// decodes it into protocol messages, without yet knowing the drone's id
/// (that arrives with the `HANDSHAKE`).
pub struct DroneSession {
    pub handle: SessionHandle,
    reader: ReadHalf<TcpStream>,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl DroneSession {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            handle: SessionHandle::from_writer(addr, Box::new(writer)),
            reader,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
        }
    }

    pub fn get_handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Read the next message. `None` means the connection closed (cleanly
    /// or otherwise); `Some(Err(_))` is a framing or parse problem the
    /// caller decides whether to treat as fatal (`FrameTooLarge`,
    /// `UnterminatedFrame`) or recoverable (`InvalidJson`, per §4.4.5).
    pub async fn recv(&mut self) -> Option<Result<ClientMessage, CodecError>> {
        loop {
            match self.decoder.decode_next() {
                Ok(Some(msg)) => return Some(Ok(msg)),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }

            match self.reader.read(&mut self.read_buf).await {
                Ok(0) => {
                    if let Err(e) = self.decoder.finish() {
                        return Some(Err(e));
                    }
                    return None;
                }
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(_) => return None,
            }
        }
    }
}

/// Drive one connection end to end: handshake, then the READY read loop,
/// then CLOSING cleanup. Runs until the peer disconnects, a fatal framing
/// error occurs, or `shutdown` fires — in which case the READY loop stops
/// reading immediately (CLOSING) and the socket closes when this function
/// returns and drops it.
pub async fn run_session(
    stream: TcpStream,
    addr: SocketAddr,
    world: Arc<World>,
    config: Arc<ServerConfig>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut session = DroneSession::new(stream, addr);

    world.counters.record_connection_up();

    let (drone_id, cell) = match await_handshake(&mut session, &world, &config).await {
        Some(pair) => pair,
        None => {
            world.counters.record_connection_down();
            return;
        }
    };
    info!(drone_id = drone_id.0, %addr, "drone handshake complete");

    loop {
        tokio::select! {
            received = session.recv() => {
                match received {
                    Some(Ok(msg)) => {
                        world.counters.record_message_in();
                        handle_ready_message(msg, &cell, &world, drone_id).await;
                    }
                    Some(Err(e)) => {
                        world.counters.record_protocol_error();
                        warn!(drone_id = drone_id.0, error = %e, "protocol error");
                        if matches!(e, CodecError::FrameTooLarge | CodecError::UnterminatedFrame) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = shutdown.recv() => {
                info!(drone_id = drone_id.0, "session entering CLOSING on shutdown signal");
                break;
            }
        }
    }

    cell.mark_disconnected().await;
    world.counters.record_connection_down();
    info!(drone_id = drone_id.0, %addr, "drone disconnected");
}

async fn await_handshake(
    session: &mut DroneSession,
    world: &World,
    config: &ServerConfig,
) -> Option<(DroneId, Arc<DroneCell>)> {
    loop {
        match session.recv().await {
            Some(Ok(ClientMessage::Handshake(h))) => {
                let status = match parse_handshake_status(&h.status) {
                    Some(s) => s,
                    None => {
                        warn!(addr = %session.handle.addr, status = %h.status, "unrecognized handshake status");
                        continue;
                    }
                };
                if !world.map.contains(&h.coord) {
                    warn!(addr = %session.handle.addr, "handshake coord out of map bounds, rejecting");
                    return None;
                }

                let handle = session.get_handle();
                let cell = match world.registry.add(handle, h.coord, status).await {
                    Ok(cell) => cell,
                    Err(RegistryError::CapacityExceeded) => {
                        warn!(addr = %session.handle.addr, "registry at capacity, rejecting drone");
                        return None;
                    }
                };

                let ack = ServerMessage::HandshakeAck {
                    session_id: Uuid::new_v4().to_string(),
                    config: HandshakeConfig {
                        status_update_interval: config.status_update_interval_ms,
                        heartbeat_interval: config.heartbeat_interval_ms,
                    },
                };
                match session.handle.send(&ack).await {
                    Ok(n) => {
                        world.counters.record_message_out();
                        world.counters.add_bytes_out(n as u64);
                    }
                    Err(e) => {
                        warn!(drone_id = cell.id.0, error = %e, "failed to send handshake ack");
                        world.registry.remove(cell.id).await;
                        return None;
                    }
                }

                return Some((cell.id, cell));
            }
            Some(Ok(_)) => {
                warn!(addr = %session.handle.addr, "expected HANDSHAKE first, ignoring other message");
                continue;
            }
            Some(Err(e)) => {
                warn!(addr = %session.handle.addr, error = %e, "framing error before handshake");
                if matches!(e, CodecError::FrameTooLarge | CodecError::UnterminatedFrame) {
                    return None;
                }
                continue;
            }
            None => return None,
        }
    }
}

async fn handle_ready_message(msg: ClientMessage, cell: &Arc<DroneCell>, world: &World, drone_id: DroneId) {
    match msg {
        ClientMessage::StatusUpdate(s) => {
            if !world.map.contains(&s.location) {
                warn!(drone_id = drone_id.0, "status update coord out of map bounds, ignoring");
                return;
            }
            let status = match parse_status_update_status(&s.status) {
                Some(st) => st,
                None => {
                    warn!(drone_id = drone_id.0, status = %s.status, "unrecognized status_update status, ignoring");
                    return;
                }
            };
            if !cell.update_status(s.location, status).await {
                warn!(drone_id = drone_id.0, "status update is not a valid transition from the current status, ignoring");
            }
        }
        ClientMessage::MissionComplete(m) => {
            let target = match cell.complete_mission(m.target_location).await {
                Some(target) => target,
                None => {
                    warn!(drone_id = drone_id.0, "mission complete is not a valid transition from the current status, ignoring");
                    return;
                }
            };
            world.counters.record_mission_completed();
            let reconciled = world.survivors.reconcile_complete(target).await;
            if !reconciled {
                warn!(
                    drone_id = drone_id.0,
                    target_x = target.x,
                    target_y = target.y,
                    "mission complete has no matching BEING_HELPED survivor at target"
                );
            }
        }
        ClientMessage::HeartbeatResponse(_) => {
            cell.refresh_heartbeat().await;
        }
        ClientMessage::Handshake(_) => {
            warn!(drone_id = drone_id.0, "duplicate HANDSHAKE after registration, ignoring");
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::SessionHandle;

    /// A `SessionHandle` backed by an in-memory duplex pipe, for tests that
    /// need a handle to construct a registry entry but never exercise the
    /// wire.
    pub fn mock_handle() -> SessionHandle {
        let (a, _b) = tokio::io::duplex(1024);
        let (_reader, writer) = tokio::io::split(a);
        SessionHandle::from_writer("0.0.0.0:0".parse().unwrap(), Box::new(writer))
    }
}
