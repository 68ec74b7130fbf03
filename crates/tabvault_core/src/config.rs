//! Record store configuration.

/// Default name of the table file inside the data directory.
pub const DEFAULT_TABLE_FILE: &str = "backend_table.csv";
/// Default name of the backup file inside the data directory.
pub const DEFAULT_BACKUP_FILE: &str = "backend_table.backup.csv";

/// Configuration for opening a record store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Table file name, relative to the data directory.
    pub table_file: String,

    /// Backup file name, relative to the data directory.
    pub backup_file: String,

    /// Whether to create the data directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the file and directory after every replace.
    pub sync_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_file: DEFAULT_TABLE_FILE.to_string(),
            backup_file: DEFAULT_BACKUP_FILE.to_string(),
            create_if_missing: true,
            sync_on_write: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table file name.
    #[must_use]
    pub fn table_file(mut self, name: impl Into<String>) -> Self {
        self.table_file = name.into();
        self
    }

    /// Sets the backup file name.
    #[must_use]
    pub fn backup_file(mut self, name: impl Into<String>) -> Self {
        self.backup_file = name.into();
        self
    }

    /// Sets whether to create the data directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync after every replace.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}
