//! Filesystem utilities.
//!
//! Record files are either a JSON array or JSON Lines (`.jsonl` / `.ndjson`).

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{EvalError, Result};

fn is_json_lines(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("jsonl" | "ndjson")
    )
}

/// Read every record from a JSON array or JSON Lines file.
pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EvalError::NotFound(path.display().to_string()));
    }

    if !is_json_lines(path) {
        let raw = std::fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&raw)?);
    }

    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|err| {
            EvalError::Config(format!("{}:{}: {err}", path.display(), number + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write records in the format implied by the file extension, creating parent dirs.
pub fn write_records<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    if is_json_lines(path) {
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
    } else {
        serde_json::to_writer(&mut writer, records)?;
    }
    writer.flush()?;
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
