//! CSV snapshot persistence with backup-before-overwrite.
//!
//! The snapshot is the only durable state. It is read once at the start of a
//! run and rewritten at most once at the end, and only when the run changed
//! something.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::answers::types::{Answer, Record};
use crate::error::SnapshotError;
use crate::ledger::store::RecordStore;

/// Column order of the snapshot file.
pub const HEADERS: [&str; 5] = [
    "Sender Name",
    "Sender Email",
    "Date Received",
    "Answer",
    "Last Updated",
];

/// Timestamp inserted into backup file names.
const BACKUP_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One CSV row, in [`HEADERS`] order.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRow {
    #[serde(rename = "Sender Name", default)]
    sender_name: String,
    #[serde(rename = "Sender Email")]
    sender_email: String,
    #[serde(rename = "Date Received", default)]
    date_received: String,
    #[serde(rename = "Answer")]
    answer: String,
    #[serde(rename = "Last Updated", default)]
    last_updated: Option<String>,
}

impl SnapshotRow {
    fn into_record(self) -> Result<Record, String> {
        let answer = self.answer.parse::<Answer>()?;
        let last_updated = self
            .last_updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok());
        Ok(Record {
            sender_name: self.sender_name,
            sender_address: self.sender_email,
            date_received: self.date_received,
            answer,
            last_updated,
        })
    }

    fn from_record(record: &Record) -> Self {
        Self {
            sender_name: record.sender_name.clone(),
            sender_email: record.sender_address.clone(),
            date_received: record.date_received.clone(),
            answer: record.answer.to_string(),
            last_updated: record
                .last_updated
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

/// Result of [`save_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed; the file was not touched.
    Skipped,
    /// A new snapshot was written. `backup` is where the previous one went.
    Written { backup: Option<PathBuf> },
}

/// Load the snapshot at `path`, falling back to an empty store.
///
/// A missing file is a first run. A malformed file is logged and discarded;
/// the next write backs it up before replacing it.
pub fn load_snapshot(path: &Path) -> RecordStore {
    if !path.exists() {
        info!(path = %path.display(), "No existing snapshot, starting empty");
        return RecordStore::new();
    }

    match read_snapshot(path) {
        Ok(records) => {
            let store = RecordStore::load(records);
            info!(path = %path.display(), records = store.len(), "Loaded snapshot");
            store
        }
        Err(e) => {
            warn!(error = %e, "Snapshot unreadable, starting with an empty store");
            RecordStore::new()
        }
    }
}

/// Parse every row of the snapshot. Any bad row fails the whole read.
pub fn read_snapshot(path: &Path) -> Result<Vec<Record>, SnapshotError> {
    let parse_err = |reason: String| SnapshotError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|e| parse_err(e.to_string()))?;
    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<SnapshotRow>().enumerate() {
        let row = row.map_err(|e| parse_err(e.to_string()))?;
        let record = row
            .into_record()
            .map_err(|reason| parse_err(format!("row {}: {reason}", idx + 1)))?;
        records.push(record);
    }
    Ok(records)
}

/// Persist `store` to `path`.
///
/// - unchanged run: no-op, the file (or its absence) is left as is
/// - changed run with an existing snapshot: rename it to a timestamped
///   backup first; a failed backup is logged and the write goes ahead
/// - changed run without a snapshot: write directly
pub fn save_snapshot(
    store: &RecordStore,
    path: &Path,
    changed: bool,
) -> Result<SaveOutcome, SnapshotError> {
    save_snapshot_at(store, path, changed, Local::now().naive_local())
}

/// [`save_snapshot`] with an explicit backup timestamp.
pub fn save_snapshot_at(
    store: &RecordStore,
    path: &Path,
    changed: bool,
    stamp: NaiveDateTime,
) -> Result<SaveOutcome, SnapshotError> {
    if !changed {
        info!(path = %path.display(), "No changes this run, snapshot left as is");
        return Ok(SaveOutcome::Skipped);
    }

    let backup = if path.exists() {
        match backup_snapshot(path, stamp) {
            Ok(backup) => {
                info!(backup = %backup.display(), "Backed up previous snapshot");
                Some(backup)
            }
            Err(e) => {
                warn!(error = %e, "Snapshot backup failed, overwriting anyway");
                None
            }
        }
    } else {
        None
    };

    write_snapshot(store, path)?;
    info!(path = %path.display(), records = store.len(), "Snapshot written");
    Ok(SaveOutcome::Written { backup })
}

/// `<stem>_<YYYYMMDD_HHMMSS><ext>` next to `path`.
pub fn backup_path(path: &Path, stamp: NaiveDateTime) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("snapshot");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{}.{ext}", stamp.format(BACKUP_STAMP_FORMAT)),
        None => format!("{stem}_{}", stamp.format(BACKUP_STAMP_FORMAT)),
    };
    path.with_file_name(name)
}

fn backup_snapshot(path: &Path, stamp: NaiveDateTime) -> Result<PathBuf, SnapshotError> {
    let backup = backup_path(path, stamp);
    fs::rename(path, &backup).map_err(|source| SnapshotError::Backup {
        path: path.to_path_buf(),
        backup: backup.clone(),
        source,
    })?;
    Ok(backup)
}

fn write_snapshot(store: &RecordStore, path: &Path) -> Result<(), SnapshotError> {
    let write_err = |reason: String| SnapshotError::Write {
        path: path.to_path_buf(),
        reason,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(HEADERS)
        .map_err(|e| write_err(e.to_string()))?;
    for record in store.all() {
        writer
            .serialize(SnapshotRow::from_record(record))
            .map_err(|e| write_err(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| write_err(e.to_string()))?;

    write_atomic(path, &bytes).map_err(|e| write_err(e.to_string()))
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("snapshot");
    let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));

    let result = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
