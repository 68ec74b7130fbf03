//! Dump sessions command implementation.

use std::path::Path;
use tabvault_server::{EventLog, SessionRecord, DEFAULT_SESSION_LOG};

/// Runs the dump-sessions command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = path.join(DEFAULT_SESSION_LOG);

    if !log_path.exists() {
        return Err("Session log not found".into());
    }

    let log = EventLog::open(&log_path)?;
    let mut records: Vec<SessionRecord> = log.read_all()?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

fn print_text_output(records: &[SessionRecord]) {
    println!("Sessions ({} total)", records.len());
    println!("================");
    println!();

    for record in records {
        println!(
            "{}  {:<20} {}",
            record.issued_at,
            record.principal,
            abbreviate(&record.token)
        );
    }
}

fn abbreviate(token: &str) -> String {
    const KEEP: usize = 12;
    match token.char_indices().nth(KEEP) {
        Some((end, _)) => format!("{}...", &token[..end]),
        None => token.to_string(),
    }
}
