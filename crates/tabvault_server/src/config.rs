//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tabvault_core::StoreConfig;

/// Default session audit log file name.
pub const DEFAULT_SESSION_LOG: &str = "sessions.log";
/// Default sample history log file name.
pub const DEFAULT_SAMPLE_LOG: &str = "samples.log";

/// Configuration for the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Directory holding the table, its backup and the event logs.
    pub data_dir: PathBuf,
    /// Record store options.
    pub store: StoreConfig,
    /// Lifetime of issued tokens.
    pub token_expiry: Duration,
    /// How often the feed produces a sample and subscribers poll.
    pub sample_interval: Duration,
    /// Upper bound on a single push to a subscriber.
    pub push_timeout: Duration,
    /// Session audit log file name (`None` keeps the log in memory).
    pub session_log: Option<String>,
    /// Sample history log file name (`None` disables sample history).
    pub sample_log: Option<String>,
}

impl ServerConfig {
    /// Creates a new server configuration rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            data_dir: data_dir.into(),
            store: StoreConfig::default(),
            token_expiry: Duration::from_secs(24 * 60 * 60),
            sample_interval: Duration::from_secs(1),
            push_timeout: Duration::from_secs(5),
            session_log: Some(DEFAULT_SESSION_LOG.to_string()),
            sample_log: Some(DEFAULT_SAMPLE_LOG.to_string()),
        }
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the record store options.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Sets the token lifetime.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Sets the sample cadence.
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Sets the per-push timeout for slow subscribers.
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    /// Sets the session log file name, or keeps it in memory with `None`.
    pub fn with_session_log(mut self, name: Option<String>) -> Self {
        self.session_log = name;
        self
    }

    /// Sets the sample history file name, or disables history with `None`.
    pub fn with_sample_log(mut self, name: Option<String>) -> Self {
        self.sample_log = name;
        self
    }

    /// Full path of the session log, if persisted.
    pub fn session_log_path(&self) -> Option<PathBuf> {
        self.session_log.as_ref().map(|name| self.data_dir.join(name))
    }

    /// Full path of the sample history log, if enabled.
    pub fn sample_log_path(&self) -> Option<PathBuf> {
        self.sample_log.as_ref().map(|name| self.data_dir.join(name))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.token_expiry, Duration::from_secs(86_400));
        assert_eq!(config.sample_interval, Duration::from_secs(1));
        assert_eq!(
            config.session_log_path(),
            Some(PathBuf::from(".").join("sessions.log"))
        );
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("/srv/vault")
            .with_bind_addr("0.0.0.0:9000".parse().unwrap())
            .with_sample_interval(Duration::from_millis(250))
            .with_session_log(None)
            .with_sample_log(None);

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.sample_interval, Duration::from_millis(250));
        assert!(config.session_log_path().is_none());
        assert!(config.sample_log_path().is_none());
    }
}
