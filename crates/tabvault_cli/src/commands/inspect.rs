//! Inspect command implementation.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tabvault_core::{CoreError, Record, RecordStore};

/// Data directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory path.
    pub path: String,
    /// Table file size in bytes (0 if absent).
    pub table_size: u64,
    /// Backup file size in bytes, if a backup exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_size: Option<u64>,
    /// Number of rows.
    pub row_count: usize,
    /// Header field names.
    pub header: Vec<String>,
    /// Every row (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Record>>,
}

/// Collects the inspection result for the data directory at `path`.
pub fn inspect(path: &Path, show_rows: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No data directory at {:?}", path).into());
    }

    let store = RecordStore::open(path)?;
    let rows = match store.list() {
        Ok(rows) => rows,
        Err(CoreError::TableNotFound { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let table_size = fs::metadata(store.table_path()).map(|m| m.len()).unwrap_or(0);
    let backup_size = fs::metadata(store.backup_path()).ok().map(|m| m.len());
    let header = rows
        .first()
        .map(|first| first.field_names().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(InspectResult {
        path: path.display().to_string(),
        table_size,
        backup_size,
        row_count: rows.len(),
        header,
        rows: show_rows.then_some(rows),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, show_rows: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, show_rows)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("tabvault Data Directory");
    println!("=======================");
    println!("Path: {}", result.path);
    println!("Table size: {} bytes", result.table_size);
    match result.backup_size {
        Some(size) => println!("Backup size: {} bytes", size),
        None => println!("Backup: none"),
    }
    println!("Rows: {}", result.row_count);
    if !result.header.is_empty() {
        println!("Header: {}", result.header.join(", "));
    }

    if let Some(rows) = &result.rows {
        println!();
        for (position, row) in rows.iter().enumerate() {
            let fields: Vec<String> = row.iter().map(|(k, v)| format!("{k}={v:?}")).collect();
            println!("[{:>4}] {}", position, fields.join(" "));
        }
    }
}
