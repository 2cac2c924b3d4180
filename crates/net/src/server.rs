//! TCP host for a scanning session
//!
//! The host device runs this server as the check-in authority on the local
//! network. Scanners connect, prove the session code, and submit scans; every
//! admitted check-in is fanned out to all joined scanners in real time.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use rand::Rng;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::line::{read_message, write_message};
use crate::protocol::{Message, NetTicket, ScanStatus};

/// Maximum number of joined scanners
const MAX_PEERS: usize = 32;

/// A scan submitted by a connected scanner
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub guest_uuid: String,
    pub event_id: i64,
    pub ticket_id: i64,
    pub check_in_count: u32,
}

/// Outcome of validating a scan against the local store
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// An entry was consumed; carries the updated ticket
    Admitted(NetTicket),
    /// Every entry already consumed; no mutation happened
    AlreadyScanned(NetTicket),
    /// No such ticket
    NotFound,
    /// Validation itself failed (storage error); reason is logged, not sent
    Failed(String),
}

/// Seam between the session server and the local store.
///
/// The host owns the authoritative check-then-mutate step; implementations
/// must keep it atomic per guest.
pub trait ScanValidator: Send + Sync {
    fn validate_scan(&self, request: &ScanRequest) -> ScanOutcome;
}

/// Server state shared across tasks
struct HostState {
    session_code: String,
    peers: HashMap<u64, mpsc::Sender<Message>>,
    next_peer_id: u64,
}

/// Session host handle
pub struct Host {
    addr: SocketAddr,
    state: Arc<RwLock<HostState>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Host {
    /// Start hosting a session on the given port (0 = ephemeral).
    ///
    /// A bind failure is fatal to host mode and surfaces here.
    pub async fn start(
        port: u16,
        session_code: String,
        validator: Arc<dyn ScanValidator>,
    ) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Session host started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = Arc::new(RwLock::new(HostState {
            session_code,
            peers: HashMap::new(),
            next_peer_id: 1,
        }));

        tokio::spawn(accept_loop(
            listener,
            state.clone(),
            validator,
            shutdown_tx.subscribe(),
        ));

        Ok(Host {
            addr: bound_addr,
            state,
            shutdown_tx,
        })
    }

    /// Get the host's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of currently joined scanners
    pub async fn client_count(&self) -> usize {
        self.state.read().await.peers.len()
    }

    /// The active session code scanners must present
    pub async fn session_code(&self) -> String {
        self.state.read().await.session_code.clone()
    }

    /// Fan an admitted check-in out to every joined scanner.
    ///
    /// Used for scans performed on the host device itself; network scans are
    /// broadcast by the connection handler.
    pub async fn broadcast_check_in(&self, ticket: NetTicket) {
        broadcast_to_peers(&self.state, Message::BroadcastUpdate { data: ticket }).await;
    }

    /// Shut the host down
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Session host shutdown initiated");
    }
}

/// Generate a 4-digit session code
pub fn generate_session_code() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    state: Arc<RwLock<HostState>>,
    validator: Arc<dyn ScanValidator>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let state = state.clone();
                        let validator = validator.clone();
                        tokio::spawn(handle_connection(stream, addr, state, validator));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single scanner connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<RwLock<HostState>>,
    validator: Arc<dyn ScanValidator>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // The session code must be proven before anything else; scans from a
    // socket that never completed the handshake are never processed.
    let (peer_id, msg_rx, msg_tx) = match handle_join(&mut reader, &mut writer, &state).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!(addr = %addr, error = %e, "Join failed");
            return;
        }
    };

    info!(addr = %addr, peer_id, "Scanner joined session");

    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    // Read loop
    loop {
        match read_message(&mut reader).await {
            Ok(Message::Scan {
                guest_uuid,
                event_id,
                ticket_id,
                check_in_count,
            }) => {
                let request = ScanRequest {
                    guest_uuid,
                    event_id,
                    ticket_id,
                    check_in_count,
                };
                handle_scan(request, &msg_tx, &state, validator.as_ref()).await;
            }
            Ok(other) => {
                debug!(peer_id, ?other, "Ignoring unexpected message");
            }
            Err(Error::Protocol(e)) => {
                // Malformed lines never tear the connection down
                warn!(peer_id, error = %e, "Skipping malformed line");
            }
            Err(Error::ConnectionClosed) => {
                debug!(peer_id, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(peer_id, error = %e, "Read error");
                break;
            }
        }
    }

    // Cleanup
    writer_handle.abort();
    remove_peer(&state, peer_id).await;
}

/// Run the session-code handshake and register the peer
async fn handle_join(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    state: &Arc<RwLock<HostState>>,
) -> Result<(u64, mpsc::Receiver<Message>, mpsc::Sender<Message>)> {
    let msg = read_message(reader).await?;

    let session_code = match msg {
        Message::JoinRequest { session_code } => session_code,
        _ => return Err(Error::Protocol("Expected join_request".into())),
    };

    let (tx, rx) = mpsc::channel(64);
    let peer_id = {
        let mut s = state.write().await;

        if s.session_code != session_code {
            drop(s);
            let _ = write_message(
                writer,
                &Message::JoinReject {
                    reason: "Invalid session code".into(),
                },
            )
            .await;
            return Err(Error::Rejected("Invalid session code".into()));
        }

        if s.peers.len() >= MAX_PEERS {
            drop(s);
            let _ = write_message(
                writer,
                &Message::JoinReject {
                    reason: "Session full".into(),
                },
            )
            .await;
            return Err(Error::Rejected("Session full".into()));
        }

        let id = s.next_peer_id;
        s.next_peer_id += 1;
        s.peers.insert(id, tx.clone());
        id
    };

    if let Err(e) = write_message(writer, &Message::JoinAccept).await {
        state.write().await.peers.remove(&peer_id);
        return Err(e);
    }

    Ok((peer_id, rx, tx))
}

/// Writer task - sends queued messages to the scanner
async fn writer_task(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_message(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Validate a scan and answer the originator, fanning admissions out
async fn handle_scan(
    request: ScanRequest,
    origin_tx: &mpsc::Sender<Message>,
    state: &Arc<RwLock<HostState>>,
    validator: &dyn ScanValidator,
) {
    debug!(guest = %request.guest_uuid, "Validating scan");

    let (reply, admitted) = match validator.validate_scan(&request) {
        ScanOutcome::Admitted(ticket) => (
            Message::ScanResult {
                status: ScanStatus::Success,
                message: "Check-in Successful".into(),
                data: Some(ticket.clone()),
            },
            Some(ticket),
        ),
        ScanOutcome::AlreadyScanned(ticket) => (
            Message::ScanResult {
                status: ScanStatus::Error,
                message: "Already Scanned".into(),
                data: Some(ticket),
            },
            None,
        ),
        ScanOutcome::NotFound => (
            Message::ScanResult {
                status: ScanStatus::Error,
                message: "Invalid QR Code".into(),
                data: None,
            },
            None,
        ),
        ScanOutcome::Failed(reason) => {
            error!(guest = %request.guest_uuid, reason = %reason, "Scan validation failed");
            (
                Message::ScanResult {
                    status: ScanStatus::Error,
                    message: "Check-in failed".into(),
                    data: None,
                },
                None,
            )
        }
    };

    // The originating socket gets the direct reply first
    if origin_tx.send(reply).await.is_err() {
        debug!("Failed to queue reply for originating scanner");
    }

    // Then every joined scanner, including the originator, hears about the
    // admission. Best effort per peer.
    if let Some(ticket) = admitted {
        broadcast_to_peers(state, Message::BroadcastUpdate { data: ticket }).await;
    }
}

/// Remove a peer from the joined set
async fn remove_peer(state: &Arc<RwLock<HostState>>, peer_id: u64) {
    let remaining = {
        let mut s = state.write().await;
        s.peers.remove(&peer_id);
        s.peers.len()
    };
    info!(peer_id, remaining, "Scanner disconnected");
}

/// Broadcast to all joined peers; a failed send is logged, not retried
async fn broadcast_to_peers(state: &Arc<RwLock<HostState>>, msg: Message) {
    let s = state.read().await;
    for (peer_id, tx) in &s.peers {
        if tx.send(msg.clone()).await.is_err() {
            debug!(peer_id, "Failed to queue broadcast for scanner");
        }
    }
}
