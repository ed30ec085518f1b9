//! State-file encoding and crash-safe writes.
//!
//! # Invariants
//! - Bytes reach the state path only through a same-directory temp file that
//!   is fsynced and renamed; readers see the old file or the new one, never a mix.
//! - Encoded files always carry the latest layout version.

use crate::model::commitment::{format_date, CommitmentStatus};
use crate::model::settings::Settings;
use crate::store::schema::latest_version;
use crate::store::Snapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Serialize)]
struct StoreFile<'a> {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    timezone: Option<&'a str>,
    settings: &'a Settings,
    days: BTreeMap<String, DayRecord<'a>>,
}

#[derive(Serialize)]
struct DayRecord<'a> {
    title: &'a str,
    status: CommitmentStatus,
    note: Option<&'a str>,
    created_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    skipped_at: Option<DateTime<Utc>>,
}

/// Serializes a snapshot to the latest on-disk layout.
pub(crate) fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
    let days = snapshot
        .ledger
        .iter()
        .map(|entry| {
            (
                format_date(entry.date),
                DayRecord {
                    title: entry.title.as_str(),
                    status: entry.status,
                    note: entry.note.as_deref(),
                    created_at: entry.created_at,
                    completed_at: entry.completed_at,
                    skipped_at: entry.skipped_at,
                },
            )
        })
        .collect();

    let file = StoreFile {
        version: latest_version(),
        timezone: snapshot.timezone.as_deref(),
        settings: &snapshot.settings,
        days,
    };
    let mut bytes = serde_json::to_vec_pretty(&file)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Replaces `path` with `bytes` using write-temp-then-rename.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
