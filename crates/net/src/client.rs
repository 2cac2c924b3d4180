//! TCP client for joining a scanning session

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::line::{read_message, write_message};
use crate::protocol::{Message, NetTicket, ScanStatus};

/// Give up on a connect attempt after this long
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    HandshakePending,
    Joined,
    Closed,
}

/// Event received from the session host
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Handshake accepted; scanning may begin
    Joined,
    /// Handshake rejected (bad session code, full session)
    Rejected { reason: String },
    /// Host's direct reply to a scan this client submitted
    ScanResult {
        status: ScanStatus,
        message: String,
        data: Option<NetTicket>,
    },
    /// A check-in admitted somewhere in the session
    BroadcastUpdate { ticket: NetTicket },
    /// Connection lost
    Disconnected,
}

/// Client handle for session operations
pub struct Client {
    state: Arc<RwLock<SessionState>>,
    event_rx: mpsc::Receiver<SessionEvent>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

enum ClientCommand {
    Send(Message),
    Disconnect,
}

impl Client {
    /// Connect to a session host and start the handshake
    pub async fn connect(addr: SocketAddr, session_code: String) -> Result<Self> {
        info!(addr = %addr, "Connecting to session host");

        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout)??;
        let (reader, mut writer) = stream.into_split();

        write_message(&mut writer, &Message::JoinRequest { session_code }).await?;

        let state = Arc::new(RwLock::new(SessionState::HandshakePending));
        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(
            BufReader::new(reader),
            writer,
            state.clone(),
            event_tx,
            cmd_rx,
        ));

        Ok(Client {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Get the next session event
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.recv().await
    }

    /// Submit a scanned QR code to the host for validation
    pub async fn send_scan(
        &self,
        guest_uuid: String,
        event_id: i64,
        ticket_id: i64,
        check_in_count: u32,
    ) -> Result<()> {
        self.cmd_tx
            .send(ClientCommand::Send(Message::Scan {
                guest_uuid,
                event_id,
                ticket_id,
                check_in_count,
            }))
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Disconnect from the session
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Current session state
    pub async fn session_state(&self) -> SessionState {
        *self.state.read().await
    }
}

/// Main connection task
async fn connection_task(
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
    state: Arc<RwLock<SessionState>>,
    event_tx: mpsc::Sender<SessionEvent>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    // Wait for the handshake reply
    match read_message(&mut reader).await {
        Ok(Message::JoinAccept) => {
            *state.write().await = SessionState::Joined;
            let _ = event_tx.send(SessionEvent::Joined).await;
            info!("Joined session");
        }
        Ok(Message::JoinReject { reason }) => {
            *state.write().await = SessionState::Closed;
            warn!(reason = %reason, "Join rejected");
            let _ = event_tx.send(SessionEvent::Rejected { reason }).await;
            return;
        }
        Ok(other) => {
            *state.write().await = SessionState::Closed;
            warn!(?other, "Unexpected handshake reply");
            let _ = event_tx.send(SessionEvent::Disconnected).await;
            return;
        }
        Err(e) => {
            *state.write().await = SessionState::Closed;
            warn!(error = %e, "Failed to read handshake reply");
            let _ = event_tx.send(SessionEvent::Disconnected).await;
            return;
        }
    }

    // Main loop - incoming messages and outgoing commands
    loop {
        tokio::select! {
            result = read_message(&mut reader) => {
                match result {
                    Ok(msg) => {
                        handle_host_message(msg, &event_tx).await;
                    }
                    Err(Error::Protocol(e)) => {
                        // Malformed lines are ignored while joined
                        warn!(error = %e, "Skipping malformed line");
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!("Host closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(msg)) => {
                        if let Err(e) = write_message(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup
    *state.write().await = SessionState::Closed;
    let _ = event_tx.send(SessionEvent::Disconnected).await;
    info!("Disconnected from session");
}

/// Surface a host message as a session event
async fn handle_host_message(msg: Message, event_tx: &mpsc::Sender<SessionEvent>) {
    match msg {
        Message::ScanResult {
            status,
            message,
            data,
        } => {
            let _ = event_tx
                .send(SessionEvent::ScanResult {
                    status,
                    message,
                    data,
                })
                .await;
        }
        Message::BroadcastUpdate { data } => {
            let _ = event_tx
                .send(SessionEvent::BroadcastUpdate { ticket: data })
                .await;
        }
        other => {
            debug!(?other, "Ignoring unexpected message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{Host, ScanOutcome, ScanRequest, ScanValidator};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory validator mimicking the local store's mutation point
    struct MapValidator {
        tickets: Mutex<HashMap<String, NetTicket>>,
    }

    impl MapValidator {
        fn with(tickets: Vec<NetTicket>) -> Arc<Self> {
            Arc::new(Self {
                tickets: Mutex::new(
                    tickets.into_iter().map(|t| (t.qr_code.clone(), t)).collect(),
                ),
            })
        }
    }

    impl ScanValidator for MapValidator {
        fn validate_scan(&self, request: &ScanRequest) -> ScanOutcome {
            let mut tickets = self.tickets.lock().unwrap();
            match tickets.get_mut(&request.guest_uuid) {
                None => ScanOutcome::NotFound,
                Some(t) if t.used_entries >= t.total_entries => {
                    ScanOutcome::AlreadyScanned(t.clone())
                }
                Some(t) => {
                    t.used_entries += 1;
                    t.status = "checked_in".into();
                    ScanOutcome::Admitted(t.clone())
                }
            }
        }
    }

    fn ticket(qr: &str, total: u32) -> NetTicket {
        NetTicket {
            event_id: 1,
            guest_id: 7,
            ticket_id: 70,
            qr_code: qr.into(),
            name: "Ada".into(),
            email: String::new(),
            phone: String::new(),
            status: "registered".into(),
            total_entries: total,
            used_entries: 0,
        }
    }

    async fn expect_event(client: &mut Client) -> SessionEvent {
        timeout(Duration::from_secs(5), client.next_event())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_handshake_accept_and_reject() {
        let host = Host::start(0, "4321".into(), MapValidator::with(vec![]))
            .await
            .unwrap();

        // Matching code joins
        let mut ok = Client::connect(host.addr(), "4321".into()).await.unwrap();
        assert!(matches!(expect_event(&mut ok).await, SessionEvent::Joined));
        assert_eq!(ok.session_state().await, SessionState::Joined);
        assert_eq!(host.client_count().await, 1);

        // Wrong code gets exactly a rejection and the socket closes
        let mut bad = Client::connect(host.addr(), "0000".into()).await.unwrap();
        match expect_event(&mut bad).await {
            SessionEvent::Rejected { reason } => assert_eq!(reason, "Invalid session code"),
            other => panic!("Expected rejection, got {other:?}"),
        }
        assert_eq!(bad.session_state().await, SessionState::Closed);
        assert_eq!(host.client_count().await, 1);

        ok.disconnect().await;
        host.shutdown();
    }

    #[tokio::test]
    async fn test_scan_fan_out_to_three_clients() {
        let validator = MapValidator::with(vec![ticket("abc", 2)]);
        let host = Host::start(0, "1111".into(), validator).await.unwrap();

        let mut clients = Vec::new();
        for _ in 0..3 {
            let mut c = Client::connect(host.addr(), "1111".into()).await.unwrap();
            assert!(matches!(expect_event(&mut c).await, SessionEvent::Joined));
            clients.push(c);
        }
        assert_eq!(host.client_count().await, 3);

        clients[0].send_scan("abc".into(), 1, 70, 1).await.unwrap();

        // Originator: direct reply first, then the broadcast
        match expect_event(&mut clients[0]).await {
            SessionEvent::ScanResult {
                status,
                message,
                data,
            } => {
                assert_eq!(status, ScanStatus::Success);
                assert_eq!(message, "Check-in Successful");
                assert_eq!(data.unwrap().used_entries, 1);
            }
            other => panic!("Expected scan result, got {other:?}"),
        }

        // Every client, originator included, receives the same broadcast
        for client in clients.iter_mut() {
            match expect_event(client).await {
                SessionEvent::BroadcastUpdate { ticket } => {
                    assert_eq!(ticket.qr_code, "abc");
                    assert_eq!(ticket.used_entries, 1);
                }
                other => panic!("Expected broadcast, got {other:?}"),
            }
        }

        host.shutdown();
    }

    #[tokio::test]
    async fn test_exhausted_ticket_rejected_without_broadcast() {
        let validator = MapValidator::with(vec![ticket("abc", 1)]);
        let host = Host::start(0, "2222".into(), validator).await.unwrap();

        let mut scanner = Client::connect(host.addr(), "2222".into()).await.unwrap();
        assert!(matches!(expect_event(&mut scanner).await, SessionEvent::Joined));

        // First scan admits
        scanner.send_scan("abc".into(), 1, 70, 1).await.unwrap();
        assert!(matches!(
            expect_event(&mut scanner).await,
            SessionEvent::ScanResult { status: ScanStatus::Success, .. }
        ));
        assert!(matches!(
            expect_event(&mut scanner).await,
            SessionEvent::BroadcastUpdate { .. }
        ));

        // Second scan is rejected with the unchanged ticket attached
        scanner.send_scan("abc".into(), 1, 70, 1).await.unwrap();
        match expect_event(&mut scanner).await {
            SessionEvent::ScanResult {
                status,
                message,
                data,
            } => {
                assert_eq!(status, ScanStatus::Error);
                assert_eq!(message, "Already Scanned");
                assert_eq!(data.unwrap().used_entries, 1);
            }
            other => panic!("Expected rejection, got {other:?}"),
        }

        // And no broadcast follows a rejection
        let quiet = timeout(Duration::from_millis(300), scanner.next_event()).await;
        assert!(quiet.is_err(), "Unexpected event after rejection: {quiet:?}");

        host.shutdown();
    }

    #[tokio::test]
    async fn test_unknown_code_gets_invalid_qr() {
        let host = Host::start(0, "3333".into(), MapValidator::with(vec![]))
            .await
            .unwrap();

        let mut scanner = Client::connect(host.addr(), "3333".into()).await.unwrap();
        assert!(matches!(expect_event(&mut scanner).await, SessionEvent::Joined));

        scanner.send_scan("ghost".into(), 1, 70, 1).await.unwrap();
        match expect_event(&mut scanner).await {
            SessionEvent::ScanResult {
                status,
                message,
                data,
            } => {
                assert_eq!(status, ScanStatus::Error);
                assert_eq!(message, "Invalid QR Code");
                assert!(data.is_none());
            }
            other => panic!("Expected rejection, got {other:?}"),
        }

        host.shutdown();
    }
}
