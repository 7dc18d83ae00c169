//! Append-only operation journal.
//!
//! Every committed mutation is appended to a JSONL (JSON Lines) file with
//! file locking so concurrent CLI invocations interleave whole lines.

use crate::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One committed operation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: Uuid,
    pub operation: String,
    pub actor: String,
    pub at: DateTime<Utc>,
    /// Ids of the entities the operation returned or changed
    #[serde(default)]
    pub affected: Vec<String>,
}

impl JournalEntry {
    pub fn new(operation: impl Into<String>, actor: impl Into<String>, affected: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: operation.into(),
            actor: actor.into(),
            at: Utc::now(),
            affected,
        }
    }
}

/// Destination for journal entries
pub trait OperationSink {
    fn append(&mut self, entry: &JournalEntry) -> Result<()>;
}

/// JSONL journal file
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl OperationSink for JsonlJournal {
    fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Journaled {} ({})", entry.operation, entry.id);
        Ok(())
    }
}

/// Read every entry, skipping lines that fail to parse
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<JournalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Skipping journal line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} journal entries", entries.len());
    Ok(entries)
}
