//! Data directory management.
//!
//! This module owns the file system layout of a record store:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK                       # Advisory lock for single-process access
//! ├─ backend_table.csv          # Current generation
//! └─ backend_table.backup.csv   # The one prior generation
//! ```
//!
//! Every replace goes through a sibling `*.tmp` file that is written, synced
//! and renamed over the target, so the table is always either the old or the
//! new generation, never a torn mix.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// A locked data directory.
///
/// Holding a `DataDir` means holding the directory's `LOCK` file; a second
/// open of the same directory, from this or another process, fails with
/// [`CoreError::DirectoryLocked`] until this one is dropped.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    table_path: PathBuf,
    backup_path: PathBuf,
    sync_on_write: bool,
    _lock_file: File,
}

impl DataDir {
    /// Opens (and with `create_if_missing`, creates) a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another handle holds the lock (returns `DirectoryLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, config: &StoreConfig) -> CoreResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_input(format!(
                    "data directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_input(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DirectoryLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            table_path: path.join(&config.table_file),
            backup_path: path.join(&config.backup_file),
            sync_on_write: config.sync_on_write,
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
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

    /// Reads a file, mapping "does not exist" to `None`.
    pub fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replaces `target` with `data` atomically.
    ///
    /// 1. Write `<target>.tmp`
    /// 2. Sync it (if `sync_on_write`)
    /// 3. Rename it over `target`
    /// 4. Sync the directory (if `sync_on_write`)
    pub fn replace(&self, target: &Path, data: &[u8]) -> io::Result<()> {
        let temp_path = temp_path_for(target);

        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            if self.sync_on_write {
                file.sync_all()?;
            }
            drop(file);
            fs::rename(&temp_path, target)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if self.sync_on_write {
            self.sync_directory()?;
        }
        Ok(())
    }

    /// Copies `source` over `target` through [`DataDir::replace`].
    ///
    /// Returns `false` without touching `target` if `source` does not exist.
    pub fn copy_over(&self, source: &Path, target: &Path) -> io::Result<bool> {
        match Self::read_optional(source)? {
            Some(bytes) => {
                self.replace(target, &bytes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Syncs the directory so renames are durable.
    #[cfg(unix)]
    fn sync_directory(&self) -> io::Result<()> {
        File::open(&self.path)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> io::Result<()> {
        // NTFS journals metadata; directory handles cannot be fsynced.
        Ok(())
    }
}

fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("table"));
    name.push(".tmp");
    target.with_file_name(name)
}
