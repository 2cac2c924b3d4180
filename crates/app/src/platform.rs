//! Data directory resolution

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{Error, Result};

/// Resolve the database location.
///
/// `GATECHECK_DB` overrides the platform data directory, mainly for
/// scripted runs and side-by-side test databases.
pub fn db_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("GATECHECK_DB") {
        return Ok(PathBuf::from(path));
    }

    let dirs = ProjectDirs::from("dev", "gatecheck", "gatecheck")
        .ok_or_else(|| Error::Config("Could not determine data directory".into()))?;

    Ok(dirs.data_dir().join("gatecheck.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override() {
        std::env::set_var("GATECHECK_DB", "/tmp/gatecheck-test.db");
        assert_eq!(db_path().unwrap(), PathBuf::from("/tmp/gatecheck-test.db"));
        std::env::remove_var("GATECHECK_DB");
    }
}
