//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Cached guest/ticket catalog, one row per admission right
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL,
                guest_id INTEGER NOT NULL,
                ticket_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                qr_code TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'registered',
                total_entries INTEGER NOT NULL DEFAULT 1,
                used_entries INTEGER NOT NULL DEFAULT 0,
                synced INTEGER NOT NULL DEFAULT 1
            );

            -- Locally recorded check-ins awaiting upload
            CREATE TABLE IF NOT EXISTS checkins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL,
                qr_guest_uuid TEXT NOT NULL,
                qr_ticket_id INTEGER NOT NULL,
                check_in_count INTEGER NOT NULL DEFAULT 1,
                given_check_in_time TEXT NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0
            );

            -- Per-guest facility sub-entitlements
            CREATE TABLE IF NOT EXISTS facilities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guest_uuid TEXT NOT NULL,
                event_id INTEGER NOT NULL,
                ticket_id INTEGER NOT NULL,
                facility_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                available_scans INTEGER NOT NULL DEFAULT 0,
                check_in INTEGER NOT NULL DEFAULT 0,
                synced INTEGER NOT NULL DEFAULT 1,
                UNIQUE(guest_uuid, event_id, ticket_id, facility_id)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes and check-in dedup constraint",
        sql: r#"
            -- Ticket indexes
            CREATE INDEX IF NOT EXISTS idx_tickets_event ON tickets(event_id);
            CREATE INDEX IF NOT EXISTS idx_tickets_qr ON tickets(qr_code);

            -- One pending check-in per guest UUID (insert-if-absent dedup)
            CREATE UNIQUE INDEX IF NOT EXISTS idx_checkins_guest
                ON checkins(qr_guest_uuid);
            CREATE INDEX IF NOT EXISTS idx_checkins_event_synced
                ON checkins(event_id, synced);

            -- Facility indexes
            CREATE INDEX IF NOT EXISTS idx_facilities_guest ON facilities(guest_uuid);
            CREATE INDEX IF NOT EXISTS idx_facilities_event_synced
                ON facilities(event_id, synced);
        "#,
    },
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    ensure_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;

            info!(version = migration.version, "Migration complete");
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )?;
    Ok(())
}

/// Get the highest applied migration version
pub fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn.query_row(
        "SELECT MAX(version) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version.unwrap_or(0))
}

fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}
