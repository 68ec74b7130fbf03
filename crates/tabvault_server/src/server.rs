//! Server assembly.

use crate::audit::EventLog;
use crate::auth::{SigningSecret, TokenService};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::feed::{NumberFeed, SampleChannel};
use crate::gate::AccessGate;
use crate::http::{router, AppState};
use crate::stream::StreamSettings;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tabvault_core::RecordStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

/// The tabvault server: record store, token service, sample feed and
/// HTTP transport wired together.
///
/// # Example
///
/// ```rust,no_run
/// use tabvault_server::{ServerConfig, VaultServer};
///
/// # async fn run() -> tabvault_server::ServerResult<()> {
/// let server = VaultServer::open(ServerConfig::new("vault"))?;
/// server.serve(async { let _ = tokio::signal::ctrl_c().await; }).await
/// # }
/// ```
#[derive(Debug)]
pub struct VaultServer {
    config: ServerConfig,
    gate: AccessGate,
    samples: Arc<SampleChannel>,
    sessions: Arc<EventLog>,
    history: Option<Arc<EventLog>>,
}

impl VaultServer {
    /// Opens the data directory with a freshly generated signing secret.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        Self::with_secret(config, SigningSecret::generate())
    }

    /// Opens the data directory signing tokens with `secret`.
    ///
    /// # Errors
    ///
    /// Fails if the data directory is locked by another process or an event
    /// log cannot be opened.
    pub fn with_secret(config: ServerConfig, secret: SigningSecret) -> ServerResult<Self> {
        let store = RecordStore::open_with_config(&config.data_dir, config.store.clone())?;

        let sessions = match config.session_log_path() {
            Some(path) => EventLog::open(&path)?,
            None => EventLog::in_memory(),
        };
        let sessions = Arc::new(sessions);

        let history = match config.sample_log_path() {
            Some(path) => Some(Arc::new(EventLog::open(&path)?)),
            None => None,
        };

        let tokens =
            TokenService::new(secret, config.token_expiry).with_audit_log(Arc::clone(&sessions));
        let gate = AccessGate::new(Arc::new(tokens), Arc::new(store));

        Ok(Self {
            config,
            gate,
            samples: Arc::new(SampleChannel::new()),
            sessions,
            history,
        })
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The token-gated store.
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// The latest-sample slot.
    pub fn samples(&self) -> &Arc<SampleChannel> {
        &self.samples
    }

    /// The session audit log.
    pub fn sessions(&self) -> &Arc<EventLog> {
        &self.sessions
    }

    /// Builds the HTTP router over this server's state.
    pub fn router(&self) -> Router {
        router(AppState {
            gate: self.gate.clone(),
            samples: Arc::clone(&self.samples),
            stream: StreamSettings {
                cadence: self.config.sample_interval,
                push_timeout: self.config.push_timeout,
            },
        })
    }

    /// Starts the sample producer on the current runtime.
    pub fn spawn_feed(&self) -> JoinHandle<()> {
        let mut feed = NumberFeed::new(Arc::clone(&self.samples), self.config.sample_interval);
        if let Some(history) = &self.history {
            feed = feed.with_history(Arc::clone(history));
        }
        feed.spawn()
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listener.local_addr()?;
        let feed = self.spawn_feed();
        let app = self.router();

        info!(%addr, data_dir = %self.config.data_dir.display(), "serving");
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        feed.abort();
        info!("server stopped");
        result.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::SessionRecord;
    use std::time::Duration;
    use tabvault_core::Record;
    use tempfile::tempdir;

    #[test]
    fn open_wires_audit_log() {
        let dir = tempdir().unwrap();
        let server = VaultServer::open(ServerConfig::new(dir.path())).unwrap();

        let token = server.gate().tokens().issue("alice").unwrap().token;
        server
            .gate()
            .append(&token, Record::new().with_field("k", "v"))
            .unwrap();

        let sessions: Vec<SessionRecord> = server.sessions().read_all().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].principal, "alice");
        assert!(dir.path().join("sessions.log").exists());
    }

    #[test]
    fn second_server_on_same_directory_fails() {
        let dir = tempdir().unwrap();
        let _first = VaultServer::open(ServerConfig::new(dir.path())).unwrap();
        assert!(VaultServer::open(ServerConfig::new(dir.path())).is_err());
    }

    #[test]
    fn in_memory_logs() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::new(dir.path())
            .with_session_log(None)
            .with_sample_log(None);
        let server = VaultServer::open(config).unwrap();
        server.gate().tokens().issue("bob").unwrap();

        assert!(!dir.path().join("sessions.log").exists());
        assert_eq!(server.sessions().read_all::<SessionRecord>().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn feed_records_history() {
        let dir = tempdir().unwrap();
        let config =
            ServerConfig::new(dir.path()).with_sample_interval(Duration::from_millis(5));
        let server = VaultServer::open(config).unwrap();

        let reader = server.samples().reader();
        let feed = server.spawn_feed();
        tokio::time::sleep(Duration::from_millis(40)).await;
        feed.abort();

        assert!(reader.latest().is_some());
        let history = std::fs::read_to_string(dir.path().join("samples.log")).unwrap();
        assert!(history.lines().count() >= 2);
    }
}
