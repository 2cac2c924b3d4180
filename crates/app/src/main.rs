//! GateCheck - offline-first event check-in
//!
//! The guest catalog is cached in SQLite, scans validate against the cache,
//! and check-ins sync back to the remote API when connectivity allows.
//! Scanning sessions share live check-in state over the local network.

use std::net::SocketAddr;
use std::sync::Arc;

use gatecheck_core::{CheckInOutcome, FacilityOutcome};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod checkin;
mod error;
mod events;
mod platform;
mod session;
mod state;
mod sync;

use api::{ApiClient, ApiConfig};
use checkin::CheckinFlow;
use error::{Error, Result};
use state::{lock_store, AppState};
use sync::SyncService;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("download") => cmd_download(&args[1..]).await,
        Some("upload") => cmd_upload(&args[1..]).await,
        Some("scan") => cmd_scan(&args[1..]),
        Some("facility") => cmd_facility(&args[1..]),
        Some("summary") => cmd_summary(&args[1..]),
        Some("host") => cmd_host(&args[1..]).await,
        Some("join") => cmd_join(&args[1..]).await,
        _ => {
            print_usage();
            Err(Error::Config("Missing or unknown command".into()))
        }
    }
}

fn print_usage() {
    eprintln!("GateCheck - offline-first event check-in");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  gatecheck download <event_id>     Fetch the guest snapshot");
    eprintln!("  gatecheck upload <event_id>       Upload pending check-ins");
    eprintln!("  gatecheck scan <qr_code>          Check a guest in locally");
    eprintln!("  gatecheck facility <event_id> <qr_code> <facility_id>");
    eprintln!("                                    Consume a facility scan");
    eprintln!("  gatecheck summary <event_id>      Show event counters");
    eprintln!("  gatecheck host [port]             Host a scanning session");
    eprintln!("  gatecheck join <addr> <code>      Join a scanning session");
    eprintln!();
    eprintln!("Environment: GATECHECK_API_URL, GATECHECK_API_TOKEN, GATECHECK_DB, RUST_LOG");
}

fn parse_arg<T: std::str::FromStr>(args: &[String], index: usize, name: &str) -> Result<T> {
    let raw = args
        .get(index)
        .ok_or_else(|| Error::Config(format!("Missing argument: {name}")))?;
    raw.parse()
        .map_err(|_| Error::Config(format!("Invalid {name}: {raw}")))
}

async fn cmd_download(args: &[String]) -> Result<()> {
    let event_id: i64 = parse_arg(args, 0, "event_id")?;
    let state = AppState::new()?;
    let api = ApiClient::new(ApiConfig::from_env()?);
    let service = SyncService::new(api, state.db.clone());

    let report = service.download_snapshot(event_id).await?;
    state
        .bus
        .emit(events::AppEvent::RefreshGuestList { event_id });
    println!(
        "Downloaded {} guests ({} stale removed)",
        report.added, report.removed
    );
    Ok(())
}

async fn cmd_upload(args: &[String]) -> Result<()> {
    let event_id: i64 = parse_arg(args, 0, "event_id")?;
    let state = AppState::new()?;
    let api = ApiClient::new(ApiConfig::from_env()?);
    let service = SyncService::new(api, state.db.clone());

    let report = service.upload_pending(event_id).await?;
    println!(
        "Uploaded {} check-ins and {} facility scans",
        report.uploaded, report.uploaded_facilities
    );
    Ok(())
}

fn cmd_scan(args: &[String]) -> Result<()> {
    let qr = args
        .first()
        .ok_or_else(|| Error::Config("Missing argument: qr_code".into()))?;
    let state = AppState::new()?;
    let flow = CheckinFlow::new(state.db.clone(), state.cache.clone(), state.bus.clone());

    match flow.scan(qr)? {
        CheckInOutcome::Admitted(t) => {
            println!("Check-in Successful ({}/{})", t.used_entries, t.total_entries)
        }
        CheckInOutcome::AlreadyScanned(t) => {
            println!("Already Scanned ({}/{})", t.used_entries, t.total_entries)
        }
        CheckInOutcome::NotFound => println!("Invalid QR Code"),
    }
    Ok(())
}

fn cmd_facility(args: &[String]) -> Result<()> {
    let event_id: i64 = parse_arg(args, 0, "event_id")?;
    let qr = args
        .get(1)
        .ok_or_else(|| Error::Config("Missing argument: qr_code".into()))?;
    let facility_id: i64 = parse_arg(args, 2, "facility_id")?;

    let state = AppState::new()?;
    let flow = CheckinFlow::new(state.db.clone(), state.cache.clone(), state.bus.clone());

    match flow.use_facility(qr, event_id, facility_id)? {
        FacilityOutcome::Granted(f) => println!(
            "Facility scan recorded ({}/{})",
            f.check_in, f.available_scans
        ),
        FacilityOutcome::Exhausted(f) => println!(
            "No facility scans remaining ({}/{})",
            f.check_in, f.available_scans
        ),
        FacilityOutcome::NotFound => println!("Unknown facility for this guest"),
    }
    Ok(())
}

fn cmd_summary(args: &[String]) -> Result<()> {
    let event_id: i64 = parse_arg(args, 0, "event_id")?;
    let state = AppState::new()?;

    let summary = {
        let db = lock_store(&state.db)?;
        db.tickets().event_summary(event_id)?
    };
    println!(
        "Event {}: {}/{} guests checked in, {}/{} entries used",
        event_id,
        summary.checked_in_guests,
        summary.total_guests,
        summary.used_entries,
        summary.total_entries
    );
    Ok(())
}

async fn cmd_host(args: &[String]) -> Result<()> {
    let port: u16 = if args.is_empty() {
        0
    } else {
        parse_arg(args, 0, "port")?
    };
    let state = Arc::new(AppState::new()?);
    session::run_host(state, port).await
}

async fn cmd_join(args: &[String]) -> Result<()> {
    let addr: SocketAddr = parse_arg(args, 0, "addr")?;
    let code = args
        .get(1)
        .ok_or_else(|| Error::Config("Missing argument: code".into()))?
        .clone();
    let state = Arc::new(AppState::new()?);
    session::run_client(state, addr, code).await
}
