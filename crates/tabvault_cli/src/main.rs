//! tabvault CLI
//!
//! Runs the tabvault server and offers offline maintenance of a data
//! directory.
//!
//! # Commands
//!
//! - `serve` - Run the HTTP/WebSocket server
//! - `inspect` - Print the table and its backup status
//! - `restore` - Restore the table from its backup while the server is stopped
//! - `dump-sessions` - Dump the session audit log

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tabvault record store server and tools.
#[derive(Parser)]
#[command(name = "tabvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// Milliseconds between samples
        #[arg(long, default_value = "1000")]
        sample_interval_ms: u64,

        /// Milliseconds a subscriber push may take before the subscriber is dropped
        #[arg(long, default_value = "5000")]
        push_timeout_ms: u64,

        /// Token lifetime in hours
        #[arg(long, default_value = "24")]
        token_expiry_hours: u64,

        /// Keep the session audit log in memory only
        #[arg(long)]
        no_session_log: bool,

        /// Do not record produced samples
        #[arg(long)]
        no_sample_history: bool,
    },

    /// Print the table and its backup status
    Inspect {
        /// Also print every row
        #[arg(short, long)]
        rows: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Restore the table from its backup
    Restore,

    /// Dump the session audit log
    DumpSessions {
        /// Maximum number of sessions to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            sample_interval_ms,
            push_timeout_ms,
            token_expiry_hours,
            no_session_log,
            no_sample_history,
        } => {
            let path = cli.path.unwrap_or_else(|| PathBuf::from("."));
            let options = commands::serve::ServeOptions {
                bind,
                sample_interval_ms,
                push_timeout_ms,
                token_expiry_hours,
                session_log: !no_session_log,
                sample_history: !no_sample_history,
            };
            commands::serve::run(&path, &options)?;
        }
        Commands::Inspect { rows, format } => {
            let path = cli.path.ok_or("Data directory path required for inspect")?;
            commands::inspect::run(&path, rows, &format)?;
        }
        Commands::Restore => {
            let path = cli.path.ok_or("Data directory path required for restore")?;
            commands::restore::run(&path)?;
        }
        Commands::DumpSessions { limit, format } => {
            let path = cli.path.ok_or("Data directory path required for dump-sessions")?;
            commands::dump_sessions::run(&path, limit, &format)?;
        }
        Commands::Version => {
            println!("tabvault CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("tabvault core v{}", tabvault_core::VERSION);
        }
    }

    Ok(())
}
