//! Restore command implementation.

use std::path::Path;
use tabvault_core::RecordStore;

/// Runs the restore command.
///
/// Fails if a server holds the data directory.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(path)?;
    store.restore_from_backup()?;
    let rows = store.list()?.len();
    println!("Backup restored successfully ({} rows)", rows);
    Ok(())
}
