//! Serve command implementation.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tabvault_server::{ServerConfig, VaultServer};
use tracing::info;

/// Options collected from the command line.
#[derive(Debug)]
pub struct ServeOptions {
    /// Listen address.
    pub bind: SocketAddr,
    /// Sample cadence in milliseconds.
    pub sample_interval_ms: u64,
    /// Per-push timeout in milliseconds.
    pub push_timeout_ms: u64,
    /// Token lifetime in hours.
    pub token_expiry_hours: u64,
    /// Persist the session audit log.
    pub session_log: bool,
    /// Persist produced samples.
    pub sample_history: bool,
}

/// Builds the server configuration for `path`.
pub fn config(path: &Path, options: &ServeOptions) -> ServerConfig {
    let expiry_secs = options.token_expiry_hours.saturating_mul(60 * 60);
    let mut config = ServerConfig::new(path)
        .with_bind_addr(options.bind)
        .with_sample_interval(Duration::from_millis(options.sample_interval_ms.max(1)))
        .with_push_timeout(Duration::from_millis(options.push_timeout_ms.max(1)))
        .with_token_expiry(Duration::from_secs(expiry_secs));
    if !options.session_log {
        config = config.with_session_log(None);
    }
    if !options.sample_history {
        config = config.with_sample_log(None);
    }
    config
}

/// Runs the serve command until Ctrl-C.
pub fn run(path: &Path, options: &ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let server = VaultServer::open(config(path, options))?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
    }))?;

    Ok(())
}
