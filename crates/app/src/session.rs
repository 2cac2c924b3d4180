//! Session wiring for the host and scanner roles
//!
//! Host mode plugs the local check-in flow into the session server, so
//! every network scan runs through the same store mutation point as a
//! local scan. Scanner mode submits codes to the host and applies
//! broadcasts monotonically without re-validating them.

use std::net::SocketAddr;
use std::sync::Arc;

use gatecheck_core::CheckInOutcome;
use gatecheck_net::{generate_session_code, Client, Host, NetTicket, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::checkin::{from_net_ticket, to_net_ticket, CheckinFlow};
use crate::error::{Error, Result};
use crate::events::AppEvent;
use crate::state::{lock_store, AppState};

/// Host a scanning session until interrupted.
///
/// The host scans too: QR codes read from stdin run through the same
/// check-in flow as network scans, and admissions fan out to every
/// connected scanner.
pub async fn run_host(state: Arc<AppState>, port: u16) -> Result<()> {
    let code = generate_session_code();
    let flow = Arc::new(CheckinFlow::new(
        state.db.clone(),
        state.cache.clone(),
        state.bus.clone(),
    ));

    let host = Host::start(port, code.clone(), flow.clone()).await?;
    info!(addr = %host.addr(), code = %code, "Session hosted");
    println!("Session code: {code}");
    println!("Listening on {}. Enter QR codes, one per line (Ctrl-C to stop):", host.addr());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = stdin.next_line() => {
                match line? {
                    Some(line) => {
                        let qr = line.trim();
                        if !qr.is_empty() {
                            scan_on_host(&flow, &host, qr).await;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    host.shutdown();
    Ok(())
}

/// Run a host-side scan and broadcast the result on admission
async fn scan_on_host(flow: &CheckinFlow, host: &Host, qr: &str) {
    match flow.scan(qr) {
        Ok(CheckInOutcome::Admitted(t)) => {
            println!("Check-in Successful ({}/{})", t.used_entries, t.total_entries);
            host.broadcast_check_in(to_net_ticket(&t)).await;
        }
        Ok(CheckInOutcome::AlreadyScanned(t)) => {
            println!("Already Scanned ({}/{})", t.used_entries, t.total_entries);
        }
        Ok(CheckInOutcome::NotFound) => println!("Unknown QR code: {qr}"),
        Err(e) => error!(qr, error = %e, "Host scan failed"),
    }
}

/// Join a session and scan from stdin until the connection drops
pub async fn run_client(state: Arc<AppState>, addr: SocketAddr, session_code: String) -> Result<()> {
    let mut client = Client::connect(addr, session_code).await?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = client.next_event() => {
                match event {
                    Some(SessionEvent::Joined) => {
                        info!("Joined session");
                        println!("Joined. Enter QR codes, one per line:");
                    }
                    Some(SessionEvent::Rejected { reason }) => {
                        return Err(gatecheck_net::Error::Rejected(reason).into());
                    }
                    Some(SessionEvent::ScanResult { message, data, .. }) => {
                        match data {
                            Some(t) => println!("{message} ({}/{})", t.used_entries, t.total_entries),
                            None => println!("{message}"),
                        }
                    }
                    Some(SessionEvent::BroadcastUpdate { ticket }) => {
                        apply_broadcast(&state, &ticket);
                    }
                    Some(SessionEvent::Disconnected) | None => {
                        warn!("Session ended");
                        break;
                    }
                }
            }

            line = stdin.next_line() => {
                match line? {
                    Some(line) => {
                        let qr = line.trim();
                        if !qr.is_empty() {
                            submit_scan(&state, &client, qr).await;
                        }
                    }
                    None => {
                        client.disconnect().await;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Look a code up locally and submit it to the host
async fn submit_scan(state: &AppState, client: &Client, qr: &str) {
    let ticket = lock_store(&state.db)
        .and_then(|db| db.tickets().find_by_qr_code(qr).map_err(Error::from));

    match ticket {
        Ok(Some(t)) => {
            let result = client
                .send_scan(t.qr_code.clone(), t.event_id, t.ticket_id, t.used_entries + 1)
                .await;
            if let Err(e) = result {
                error!(error = %e, "Failed to submit scan");
            }
        }
        Ok(None) => println!("Unknown QR code: {qr}"),
        Err(e) => error!(error = %e, "Ticket lookup failed"),
    }
}

/// Apply a host broadcast: monotonic store update, then cache and announce.
///
/// The host already validated the scan; applying it must never decrease the
/// local entry count, so stale or reordered broadcasts are harmless.
fn apply_broadcast(state: &AppState, ticket: &NetTicket) {
    let applied = lock_store(&state.db)
        .and_then(|db| db.tickets().apply_observed(&from_net_ticket(ticket)).map_err(Error::from));
    if let Err(e) = applied {
        error!(guest = %ticket.qr_code, error = %e, "Failed to apply broadcast");
        return;
    }

    state.cache.record(
        &ticket.qr_code,
        ticket.used_entries,
        ticket.total_entries,
        &ticket.status,
    );
    state.bus.emit(AppEvent::BroadcastCheckIn {
        guest_uuid: ticket.qr_code.clone(),
        used_entries: ticket.used_entries,
        total_entries: ticket.total_entries,
    });
    info!(guest = %ticket.qr_code, used = ticket.used_entries, "Broadcast applied");
}
