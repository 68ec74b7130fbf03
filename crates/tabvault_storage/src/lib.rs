//! # tabvault storage
//!
//! Append-only byte stores backing tabvault's event logs (session audit
//! records and sample history).
//!
//! Backends are **opaque**: they never interpret what they hold. Framing
//! (one JSON document per line) belongs to the caller.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and throwaway servers
//! - [`FileBackend`] - Persistent, survives restarts
//!
//! ## Example
//!
//! ```rust
//! use tabvault_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"{\"event\":1}\n").unwrap();
//! assert_eq!(offset, 0);
//! assert_eq!(backend.read_all().unwrap(), b"{\"event\":1}\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
