//! Append-only event logs.
//!
//! Session issuance and produced samples are recorded as one JSON document
//! per line on a [`StorageBackend`]. Logs are write-mostly: nothing on the
//! request path reads them back. A crash can leave a torn final line, which
//! [`EventLog::read_all`] drops.

use crate::error::{ServerError, ServerResult};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tabvault_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// Audit entry written whenever a token is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Principal the token names.
    pub principal: String,
    /// The issued token.
    pub token: String,
    /// Issuance time, RFC 3339 UTC.
    pub issued_at: String,
}

/// An append-only log of JSON events.
///
/// Appends are serialized by an internal lock that is independent of the
/// record store's lock.
pub struct EventLog {
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl EventLog {
    /// Creates a log over an existing backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Creates a log that lives only in memory.
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryBackend::new()))
    }

    /// Opens (or creates) a file-backed log.
    pub fn open(path: &Path) -> ServerResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Ok(Self::new(Box::new(backend)))
    }

    /// Appends one event and syncs it to disk; returns its byte offset.
    pub fn append<T: Serialize>(&self, event: &T) -> ServerResult<u64> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut backend = self.backend.lock();
        let offset = backend.append(&line)?;
        backend.flush()?;
        backend.sync()?;
        Ok(offset)
    }

    /// Reads every complete event in append order.
    pub fn read_all<T: DeserializeOwned>(&self) -> ServerResult<Vec<T>> {
        let data = self.backend.lock().read_all()?;

        let complete = match data.iter().rposition(|&b| b == b'\n') {
            Some(end) => &data[..=end],
            None => return Ok(Vec::new()),
        };

        complete
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).map_err(ServerError::from))
            .collect()
    }

    /// Size of the log in bytes.
    pub fn size(&self) -> ServerResult<u64> {
        Ok(self.backend.lock().size()?)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}
