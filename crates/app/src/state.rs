//! Application state wiring

use std::sync::{Arc, Mutex, MutexGuard};

use gatecheck_core::{Database, ScanCache};

use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::platform;

/// Lock the shared store, surfacing poisoning as an error instead of a
/// panic so one crashed task cannot take the whole process down with it.
pub fn lock_store(db: &Mutex<Database>) -> Result<MutexGuard<'_, Database>> {
    db.lock().map_err(|_| Error::StorePoisoned)
}

/// Shared application state
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub cache: ScanCache,
    pub bus: EventBus,
}

impl AppState {
    /// Open the database at the platform data path and wire up shared state
    pub fn new() -> Result<Self> {
        let db_path = platform::db_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        Ok(Self::with_database(db))
    }

    /// Wrap an already-open database
    pub fn with_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            cache: ScanCache::new(),
            bus: EventBus::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_store_reports_poisoning() {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));

        let poison = db.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poison.lock().unwrap();
            panic!("simulated crash");
        })
        .join();

        assert!(matches!(lock_store(&db), Err(Error::StorePoisoned)));
    }

    #[test]
    fn test_with_database_shares_handles() {
        let state = AppState::with_database(Database::open_in_memory().unwrap());
        let cache = state.cache.clone();

        cache.record("g-1", 1, 1, "checked_in");
        assert_eq!(state.cache.get("g-1").unwrap().used_entries, 1);
    }
}
