//! # tabvault core
//!
//! A small record store kept in one comma-separated file, with exactly one
//! backup generation and restore-from-backup.
//!
//! ## Guarantees
//!
//! - One exclusive lock serializes every operation; no reader parallelism
//! - The previous generation is copied to the backup file before each
//!   mutation, never before a read
//! - The table is replaced atomically (temp file + rename)
//! - Rows are addressed by 0-based position in the current file
//! - The first record's fields form the header; later records are laid out
//!   against it
//!
//! ## Example
//!
//! ```rust,no_run
//! use tabvault_core::{Record, RecordStore};
//! use std::path::Path;
//!
//! let store = RecordStore::open(Path::new("vault")).unwrap();
//! store.append(Record::new().with_field("name", "x").with_field("qty", "1")).unwrap();
//! for record in store.list().unwrap() {
//!     println!("{:?}", record.get("name"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod codec;
mod config;
mod dir;
mod error;
mod record;
mod store;

pub use config::{StoreConfig, DEFAULT_BACKUP_FILE, DEFAULT_TABLE_FILE};
pub use dir::DataDir;
pub use error::{CoreError, CoreResult};
pub use record::Record;
pub use store::{BackupOutcome, MutationReport, RecordStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
