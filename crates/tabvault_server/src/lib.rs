//! # tabvault server
//!
//! Token-gated HTTP access to a [`tabvault_core::RecordStore`], plus a
//! WebSocket stream of periodically produced random samples.
//!
//! This crate provides:
//! - HS256 JWT bearer tokens (24h lifetime by default)
//! - An access gate that verifies the token before any store I/O
//! - A background feed publishing one sample per interval into a
//!   last-write-wins slot
//! - Per-subscriber push loops with a bounded push timeout
//! - An append-only session audit log
//!
//! # Authentication
//!
//! Any valid token grants full access. Credentials presented at login are
//! not checked. The signing secret is generated once per process, so a
//! restart invalidates all tokens.
//!
//! ```rust,no_run
//! use tabvault_server::{ServerConfig, VaultServer};
//! use tabvault_core::Record;
//!
//! let server = VaultServer::open(ServerConfig::new("vault")).unwrap();
//! let token = server.gate().tokens().issue("alice").unwrap().token;
//! server.gate().append(&token, Record::new().with_field("name", "x")).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod audit;
mod auth;
mod config;
mod error;
mod feed;
mod gate;
mod http;
mod server;
mod stream;

pub use audit::{EventLog, SessionRecord};
pub use auth::{Claims, IssuedToken, SigningSecret, TokenService, SECRET_LEN};
pub use config::{ServerConfig, DEFAULT_SAMPLE_LOG, DEFAULT_SESSION_LOG};
pub use error::{ServerError, ServerResult};
pub use feed::{NumberFeed, Sample, SampleChannel, SampleReader};
pub use gate::AccessGate;
pub use http::{router, AppState};
pub use server::VaultServer;
pub use stream::{
    run_subscriber, serve_websocket, SampleSink, SinkClosed, StreamSettings, SubscriberExit,
};
