//! Token-gated access to the record store.
//!
//! Every entry point verifies the bearer token first. A rejected token
//! returns `Unauthorized` before the store is touched.

use crate::auth::TokenService;
use crate::error::{ServerError, ServerResult};
use std::sync::Arc;
use tabvault_core::{MutationReport, Record, RecordStore};
use tracing::debug;

/// Guards a [`RecordStore`] behind a [`TokenService`].
#[derive(Debug, Clone)]
pub struct AccessGate {
    tokens: Arc<TokenService>,
    store: Arc<RecordStore>,
}

impl AccessGate {
    /// Creates a gate over `store`.
    pub fn new(tokens: Arc<TokenService>, store: Arc<RecordStore>) -> Self {
        Self { tokens, store }
    }

    /// The token service used for verification.
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// The guarded store.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Verifies `token` and returns the principal it names.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a missing, malformed, forged or expired token.
    pub fn authorize(&self, token: &str) -> ServerResult<String> {
        self.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "rejected token");
            ServerError::Unauthorized(e.to_string())
        })
    }

    /// Lists every record.
    pub fn list(&self, token: &str) -> ServerResult<Vec<Record>> {
        self.authorize(token)?;
        Ok(self.store.list()?)
    }

    /// Appends a record.
    pub fn append(&self, token: &str, record: Record) -> ServerResult<MutationReport> {
        let principal = self.authorize(token)?;
        debug!(%principal, "append");
        Ok(self.store.append(record)?)
    }

    /// Merges `patch` into the record at `position`.
    ///
    /// Negative positions are reported as `NotFound`.
    pub fn update(&self, token: &str, position: i64, patch: &Record) -> ServerResult<MutationReport> {
        let principal = self.authorize(token)?;
        let position = row_index(position)?;
        debug!(%principal, position, "update");
        Ok(self.store.update(position, patch)?)
    }

    /// Deletes the record at `position`.
    pub fn delete(&self, token: &str, position: i64) -> ServerResult<MutationReport> {
        let principal = self.authorize(token)?;
        let position = row_index(position)?;
        debug!(%principal, position, "delete");
        Ok(self.store.delete(position)?)
    }

    /// Restores the table from its backup generation.
    pub fn restore(&self, token: &str) -> ServerResult<()> {
        let principal = self.authorize(token)?;
        debug!(%principal, "restore");
        Ok(self.store.restore_from_backup()?)
    }
}

fn row_index(position: i64) -> ServerResult<usize> {
    usize::try_from(position).map_err(|_| ServerError::NotFound(format!("row {position}")))
}
