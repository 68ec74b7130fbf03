//! The record store.
//!
//! A [`RecordStore`] owns a data directory and serializes every operation on
//! it through one exclusive lock. Reads and writes exclude each other; the
//! lock spans the whole backup/read/modify/rewrite cycle and is released on
//! every exit path when the guard drops.
//!
//! ## Generations
//!
//! Each mutation first copies the current table to the backup file, so the
//! backup always holds the generation immediately before the last mutation.
//! [`RecordStore::restore_from_backup`] copies it back and leaves the backup
//! in place.
//!
//! ## Positions
//!
//! Rows are addressed by their 0-based position in the current file. A
//! position is recomputed on every call; it is not a stable key.

use crate::codec::{decode_bytes, encode_table};
use crate::config::StoreConfig;
use crate::dir::DataDir;
use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What happened to the backup generation during a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// The previous table was copied to the backup file.
    Taken,
    /// There was no table yet, so there was nothing to back up.
    Skipped,
    /// The copy failed; the mutation went ahead without a fresh backup.
    Failed(String),
}

/// Summary of a completed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    /// Backup step result.
    pub backup: BackupOutcome,
    /// Number of rows in the table after the mutation.
    pub row_count: usize,
}

/// A file-backed table of records with a single backup generation.
///
/// # Example
///
/// ```rust,no_run
/// use tabvault_core::{Record, RecordStore};
/// use std::path::Path;
///
/// let store = RecordStore::open(Path::new("vault")).unwrap();
/// store.append(Record::new().with_field("name", "x").with_field("qty", "1")).unwrap();
/// store.update(0, &Record::new().with_field("qty", "5")).unwrap();
/// store.restore_from_backup().unwrap();
/// assert_eq!(store.list().unwrap()[0].get("qty"), Some("1"));
/// ```
#[derive(Debug)]
pub struct RecordStore {
    dir: Mutex<DataDir>,
    table_path: PathBuf,
    backup_path: PathBuf,
}

impl RecordStore {
    /// Opens a store in `path` with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`DataDir::open`].
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a store in `path` with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`DataDir::open`].
    pub fn open_with_config(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        let dir = DataDir::open(path, &config)?;
        let table_path = dir.table_path().to_path_buf();
        let backup_path = dir.backup_path().to_path_buf();
        Ok(Self {
            dir: Mutex::new(dir),
            table_path,
            backup_path,
        })
    }

    /// Returns the path to the table file.
    #[must_use]
    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    /// Returns the path to the backup file.
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Returns all records in file order.
    ///
    /// # Errors
    ///
    /// - `TableNotFound` if the table has never been written
    /// - `Malformed` if the file cannot be parsed
    pub fn list(&self) -> CoreResult<Vec<Record>> {
        let dir = self.dir.lock();
        let records = read_table(&dir)?.ok_or_else(|| CoreError::TableNotFound {
            path: dir.table_path().to_path_buf(),
        })?;
        debug!(rows = records.len(), "listed table");
        Ok(records)
    }

    /// Appends a record at the end of the table.
    ///
    /// The backup is best-effort here: if copying fails the append still
    /// happens and the failure is reported as [`BackupOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a record without fields
    /// - `Write` if the rewrite fails
    pub fn append(&self, record: Record) -> CoreResult<MutationReport> {
        if record.is_empty() {
            return Err(CoreError::invalid_input("record has no fields"));
        }

        let dir = self.dir.lock();
        let backup = match dir.copy_over(dir.table_path(), dir.backup_path()) {
            Ok(true) => BackupOutcome::Taken,
            Ok(false) => BackupOutcome::Skipped,
            Err(e) => {
                warn!(error = %e, "backup before append failed; appending anyway");
                BackupOutcome::Failed(e.to_string())
            }
        };

        let mut records = read_table(&dir)?.unwrap_or_default();
        records.push(record);
        write_table(&dir, &records)?;

        debug!(rows = records.len(), ?backup, "appended row");
        Ok(MutationReport {
            backup,
            row_count: records.len(),
        })
    }

    /// Merges `patch` into the record at `position`.
    ///
    /// Fields that the table header does not name are lost on rewrite.
    ///
    /// # Errors
    ///
    /// - `Write` if the table does not exist or the rewrite fails
    /// - `Backup` if the backup copy fails (table untouched)
    /// - `RowOutOfRange` if `position` is past the end (table untouched)
    pub fn update(&self, position: usize, patch: &Record) -> CoreResult<MutationReport> {
        self.mutate_at(position, |records| records[position].merge(patch))
    }

    /// Removes the record at `position`; later rows shift down by one.
    ///
    /// Removing the last row leaves an empty file with no header.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::update`].
    pub fn delete(&self, position: usize) -> CoreResult<MutationReport> {
        self.mutate_at(position, |records| {
            records.remove(position);
        })
    }

    /// Replaces the table with the backup generation.
    ///
    /// The backup is kept, so restoring twice yields the same table.
    ///
    /// # Errors
    ///
    /// - `BackupNotFound` if no backup exists
    /// - `Write` if replacing the table fails
    pub fn restore_from_backup(&self) -> CoreResult<()> {
        let dir = self.dir.lock();
        match dir.copy_over(dir.backup_path(), dir.table_path()) {
            Ok(true) => {
                debug!("restored table from backup");
                Ok(())
            }
            Ok(false) => Err(CoreError::BackupNotFound {
                path: dir.backup_path().to_path_buf(),
            }),
            Err(e) => Err(CoreError::write(e)),
        }
    }

    /// Returns true if a backup generation exists.
    pub fn has_backup(&self) -> bool {
        let dir = self.dir.lock();
        dir.backup_path().exists()
    }

    /// Shared path of update and delete: require a table, back it up,
    /// bounds-check, apply, rewrite.
    fn mutate_at(
        &self,
        position: usize,
        apply: impl FnOnce(&mut Vec<Record>),
    ) -> CoreResult<MutationReport> {
        let dir = self.dir.lock();

        if !dir.table_path().exists() {
            return Err(CoreError::write(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no table at {}", dir.table_path().display()),
            )));
        }

        dir.copy_over(dir.table_path(), dir.backup_path())
            .map_err(CoreError::backup)?;

        let mut records = read_table(&dir)?.unwrap_or_default();
        if position >= records.len() {
            return Err(CoreError::RowOutOfRange {
                position,
                count: records.len(),
            });
        }

        apply(&mut records);
        write_table(&dir, &records)?;

        debug!(position, rows = records.len(), "rewrote table");
        Ok(MutationReport {
            backup: BackupOutcome::Taken,
            row_count: records.len(),
        })
    }
}

fn read_table(dir: &DataDir) -> CoreResult<Option<Vec<Record>>> {
    match DataDir::read_optional(dir.table_path())? {
        Some(bytes) => Ok(Some(decode_bytes(&bytes)?)),
        None => Ok(None),
    }
}

fn write_table(dir: &DataDir, records: &[Record]) -> CoreResult<()> {
    let text = encode_table(records);
    dir.replace(dir.table_path(), text.as_bytes())
        .map_err(CoreError::write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    fn open_store() -> (TempDir, RecordStore) {
        let temp = tempdir().unwrap();
        let config = StoreConfig::default().sync_on_write(false);
        let store = RecordStore::open_with_config(temp.path(), config).unwrap();
        (temp, store)
    }

    #[test]
    fn list_without_table_is_not_found() {
        let (_temp, store) = open_store();
        assert!(matches!(store.list(), Err(CoreError::TableNotFound { .. })));
    }

    #[test]
    fn list_empty_file_is_empty() {
        let (_temp, store) = open_store();
        fs::write(store.table_path(), b"").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn first_append_skips_backup() {
        let (_temp, store) = open_store();
        let input = record(&[("name", "x"), ("qty", "1")]);

        let report = store.append(input.clone()).unwrap();
        assert_eq!(report.backup, BackupOutcome::Skipped);
        assert_eq!(report.row_count, 1);
        assert!(!store.has_backup());
        assert_eq!(store.list().unwrap(), vec![input]);
    }

    #[test]
    fn append_backs_up_previous_generation() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "x")])).unwrap();
        let before = fs::read(store.table_path()).unwrap();

        let report = store.append(record(&[("name", "y")])).unwrap();
        assert_eq!(report.backup, BackupOutcome::Taken);
        assert_eq!(fs::read(store.backup_path()).unwrap(), before);
    }

    #[test]
    fn append_rejects_empty_record() {
        let (_temp, store) = open_store();
        assert!(matches!(
            store.append(Record::new()),
            Err(CoreError::InvalidInput { .. })
        ));
        assert!(!store.table_path().exists());
    }

    #[test]
    fn append_drops_fields_outside_header() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "x"), ("qty", "1")])).unwrap();
        store.append(record(&[("qty", "2"), ("color", "red")])).unwrap();

        let rows = store.list().unwrap();
        assert_eq!(rows[1], record(&[("name", ""), ("qty", "2")]));
    }

    #[test]
    fn update_changes_only_patched_fields() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "x"), ("qty", "1")])).unwrap();
        store.append(record(&[("name", "y"), ("qty", "2")])).unwrap();

        store.update(0, &record(&[("qty", "5")])).unwrap();

        assert_eq!(
            store.list().unwrap(),
            vec![
                record(&[("name", "x"), ("qty", "5")]),
                record(&[("name", "y"), ("qty", "2")]),
            ]
        );
    }

    #[test]
    fn update_new_field_is_lost() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "x")])).unwrap();
        store.update(0, &record(&[("note", "hi")])).unwrap();

        assert_eq!(store.list().unwrap(), vec![record(&[("name", "x")])]);
    }

    #[test]
    fn update_out_of_range_leaves_table_identical() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "x")])).unwrap();
        let before = fs::read(store.table_path()).unwrap();

        let err = store.update(1, &record(&[("name", "z")])).unwrap_err();
        assert!(matches!(
            err,
            CoreError::RowOutOfRange {
                position: 1,
                count: 1
            }
        ));
        assert_eq!(fs::read(store.table_path()).unwrap(), before);
    }

    #[test]
    fn update_without_table_is_write_error() {
        let (_temp, store) = open_store();
        let err = store.update(0, &record(&[("a", "b")])).unwrap_err();
        assert!(err.is_write_error());
        assert!(!store.has_backup());
    }

    /// Puts a directory where the backup file goes so the rename fails.
    fn block_backup(store: &RecordStore) {
        let _ = fs::remove_file(store.backup_path());
        fs::create_dir(store.backup_path()).unwrap();
    }

    #[test]
    fn append_survives_failed_backup() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "x")])).unwrap();
        block_backup(&store);

        let report = store.append(record(&[("name", "y")])).unwrap();
        assert!(matches!(report.backup, BackupOutcome::Failed(_)));
        assert_eq!(report.row_count, 2);
        assert_eq!(
            store.list().unwrap(),
            vec![record(&[("name", "x")]), record(&[("name", "y")])]
        );
        assert!(store.backup_path().is_dir());
    }

    #[test]
    fn update_aborts_on_failed_backup() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "x"), ("qty", "1")])).unwrap();
        block_backup(&store);
        let before = fs::read(store.table_path()).unwrap();

        let err = store.update(0, &record(&[("qty", "9")])).unwrap_err();
        assert!(matches!(err, CoreError::Backup { .. }));
        assert_eq!(fs::read(store.table_path()).unwrap(), before);
    }

    #[test]
    fn delete_aborts_on_failed_backup() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "x")])).unwrap();
        store.append(record(&[("name", "y")])).unwrap();
        block_backup(&store);
        let before = fs::read(store.table_path()).unwrap();

        let err = store.delete(0).unwrap_err();
        assert!(matches!(err, CoreError::Backup { .. }));
        assert_eq!(fs::read(store.table_path()).unwrap(), before);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn delete_shifts_positions() {
        let (_temp, store) = open_store();
        for name in ["a", "b", "c"] {
            store.append(record(&[("name", name)])).unwrap();
        }

        let report = store.delete(1).unwrap();
        assert_eq!(report.row_count, 2);
        assert_eq!(
            store.list().unwrap(),
            vec![record(&[("name", "a")]), record(&[("name", "c")])]
        );
    }

    #[test]
    fn delete_until_empty_omits_header() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "a")])).unwrap();
        store.append(record(&[("name", "b")])).unwrap();

        store.delete(0).unwrap();
        store.delete(0).unwrap();

        assert!(store.list().unwrap().is_empty());
        assert!(fs::read(store.table_path()).unwrap().is_empty());
    }

    #[test]
    fn delete_out_of_range() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "a")])).unwrap();
        assert!(store.delete(5).unwrap_err().is_not_found());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn restore_without_backup_is_not_found() {
        let (_temp, store) = open_store();
        assert!(matches!(
            store.restore_from_backup(),
            Err(CoreError::BackupNotFound { .. })
        ));
    }

    #[test]
    fn restore_keeps_backup_for_second_restore() {
        let (_temp, store) = open_store();
        store.append(record(&[("name", "a")])).unwrap();
        store.append(record(&[("name", "b")])).unwrap();

        store.restore_from_backup().unwrap();
        assert_eq!(store.list().unwrap(), vec![record(&[("name", "a")])]);
        assert!(store.has_backup());

        store.restore_from_backup().unwrap();
        assert_eq!(store.list().unwrap(), vec![record(&[("name", "a")])]);
    }

    #[test]
    fn malformed_table_is_reported() {
        let (_temp, store) = open_store();
        fs::write(store.table_path(), b"name\r\n\"never closed").unwrap();
        assert!(matches!(store.list(), Err(CoreError::Malformed { .. })));
    }

    #[test]
    fn concurrent_appends_are_serialized() {
        let (_temp, store) = open_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let id = format!("{t}-{i}");
                        store.append(record(&[("id", id.as_str())])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.list().unwrap().len(), 80);
    }
}
