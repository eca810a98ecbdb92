//! Single-socket multiplexer fronting many sessions (spec §4.6), run as one Tokio task
//! that owns the socket and the session table: callers reach it through a cloneable
//! handle and an `mpsc` command channel rather than a `Mutex`/`RwLock` around the
//! session map.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};

use crate::error::Error;
use crate::session::{Session, SessionState};

/// Largest datagram this endpoint will read off the wire in one `recv_from`.
const MAX_DATAGRAM_LEN: usize = 16 * 1024 + 256;

/// Construction parameters for an [`Endpoint`] (ambient configuration, spec §2).
pub struct EndpointConfig {
    pub bind_addr: SocketAddr,
}

/// One inbound occurrence an application consumes via [`Endpoint::recv`].
#[derive(Debug, Clone)]
pub enum DatagramEvent {
    Connected { peer: SocketAddr },
    Disconnected { peer: SocketAddr },
    Message { peer: SocketAddr, data: Vec<u8> },
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct OutboundKey {
    addr: SocketAddr,
    identity: Vec<u8>,
    psk: Vec<u8>,
}

enum Command {
    Send { host: String, port: u16, identity: Vec<u8>, psk: Vec<u8>, data: Vec<u8> },
    Close,
}

/// A cloneable handle to the running endpoint task. Mirrors the teacher's pattern of a
/// thin handle communicating with an owning task over `tokio::sync::mpsc` rather than
/// sharing session state behind a lock.
pub struct Endpoint {
    cmd_tx: mpsc::Sender<Command>,
    event_rx: Mutex<mpsc::Receiver<DatagramEvent>>,
}

impl Endpoint {
    pub async fn bind(config: EndpointConfig) -> Result<Self, Error> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        let family_is_v4 = config.bind_addr.is_ipv4();
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);
        tokio::spawn(run(socket, family_is_v4, cmd_rx, event_tx));
        Ok(Self { cmd_tx, event_rx: Mutex::new(event_rx) })
    }

    /// Resolves `host`/`port` if needed, finds or creates the matching session (keyed
    /// on `(address, port, identity, psk)`), and queues or transmits `data` (spec §4.6).
    pub async fn send(&self, data: &[u8], host: &str, port: u16, identity: &[u8], psk: &[u8]) -> Result<(), Error> {
        self.cmd_tx
            .send(Command::Send { host: host.to_string(), port, identity: identity.to_vec(), psk: psk.to_vec(), data: data.to_vec() })
            .await
            .map_err(|_| Error::PeerClosed)
    }

    /// Awaits the next connect/disconnect/message event, or `None` once the endpoint
    /// has been closed and every pending event drained.
    pub async fn recv(&self) -> Option<DatagramEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await
    }

    pub async fn close(self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }
}

fn now_unix_secs() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0)
}

async fn resolve(host: &str, port: u16, family_is_v4: bool) -> Option<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if ip.is_ipv4() == family_is_v4 {
            return Some(SocketAddr::new(ip, port));
        }
        return None;
    }
    let addrs = tokio::net::lookup_host((host, port)).await.ok()?;
    addrs.into_iter().find(|a| a.is_ipv4() == family_is_v4)
}

async fn run(socket: UdpSocket, family_is_v4: bool, mut cmd_rx: mpsc::Receiver<Command>, event_tx: mpsc::Sender<DatagramEvent>) {
    let mut sessions: HashMap<SocketAddr, Session> = HashMap::new();
    let mut outbound_index: HashMap<OutboundKey, SocketAddr> = HashMap::new();
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(Command::Close) => break,
                    Some(Command::Send { host, port, identity, psk, data }) => {
                        handle_send(&socket, family_is_v4, &mut sessions, &mut outbound_index, host, port, identity, psk, data).await;
                    }
                }
            }
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((n, peer)) => handle_inbound(&socket, &mut sessions, peer, &buf[..n], &event_tx).await,
                    Err(e) => log::warn!("udp recv error: {e}"),
                }
            }
        }
    }
}

async fn handle_send(
    socket: &UdpSocket,
    family_is_v4: bool,
    sessions: &mut HashMap<SocketAddr, Session>,
    outbound_index: &mut HashMap<OutboundKey, SocketAddr>,
    host: String,
    port: u16,
    identity: Vec<u8>,
    psk: Vec<u8>,
    data: Vec<u8>,
) {
    let addr = match resolve(&host, port, family_is_v4).await {
        Some(a) => a,
        None => {
            log::warn!("resolution failed for {host}:{port}, dropping send");
            return;
        }
    };

    let key = OutboundKey { addr, identity: identity.clone(), psk: psk.clone() };
    if let Some(&existing) = outbound_index.get(&key) {
        if let Some(session) = sessions.get_mut(&existing) {
            match session.send_application(data) {
                Ok(Some(bytes)) => {
                    let _ = socket.send_to(&bytes, existing).await;
                }
                Ok(None) => {}
                Err(e) => log::warn!("encoding application data for {existing} failed: {e}"),
            }
            return;
        }
    }

    let mut session = match Session::new(addr, identity, psk, now_unix_secs()) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("session creation for {addr} failed: {e}");
            return;
        }
    };
    // Queued now; delivered once the handshake reaches Connected.
    let _ = session.send_application(data);
    match session.start() {
        Ok(datagrams) => {
            for d in &datagrams {
                let _ = socket.send_to(d, addr).await;
            }
        }
        Err(e) => {
            log::warn!("starting handshake with {addr} failed: {e}");
            return;
        }
    }
    sessions.insert(addr, session);
    outbound_index.insert(key, addr);
}

async fn handle_inbound(socket: &UdpSocket, sessions: &mut HashMap<SocketAddr, Session>, peer: SocketAddr, bytes: &[u8], event_tx: &mpsc::Sender<DatagramEvent>) {
    let (output, should_remove) = {
        let session = match sessions.get_mut(&peer) {
            Some(s) => s,
            None => {
                log::warn!("datagram from unrouted peer {peer}, dropping");
                return;
            }
        };
        let output = session.on_datagram(bytes);
        let should_remove = output.just_disconnected || session.state == SessionState::Failed;
        (output, should_remove)
    };

    for d in &output.outbound {
        let _ = socket.send_to(d, peer).await;
    }
    if output.just_connected {
        let _ = event_tx.send(DatagramEvent::Connected { peer }).await;
    }
    for m in output.messages {
        let _ = event_tx.send(DatagramEvent::Message { peer, data: m }).await;
    }
    if output.just_disconnected {
        let _ = event_tx.send(DatagramEvent::Disconnected { peer }).await;
    }
    if should_remove {
        sessions.remove(&peer);
    }
}
