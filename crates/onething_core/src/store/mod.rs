//! Single-file JSON state store.
//!
//! # Responsibility
//! - Load the state file, upgrading older layouts through the schema registry.
//! - Validate structural integrity before any read or write proceeds.
//! - Persist full snapshots with crash-safe atomic replacement.
//! - Serialize in-process mutations through `Store::with_mutation`.
//!
//! # Invariants
//! - The in-memory snapshot always equals the last successfully written file.
//! - A migrated file is written back only after every step succeeded.
//! - A failed mutation changes neither memory nor disk.
//!
//! # See also
//! - `crate::doctor` for files this module refuses to open.

use crate::ledger::Ledger;
use crate::model::settings::Settings;
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

mod file;
pub mod layout;
pub mod schema;

use layout::RawStore;
pub use layout::StoreIssue;
use schema::{latest_version, SchemaError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failures.
#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    /// Bytes are not a structurally valid record at any known version.
    CorruptStore { path: PathBuf, issue: StoreIssue },
    UnsupportedSchemaVersion { found: u32, latest: u32 },
    Serialize(serde_json::Error),
}

impl StoreError {
    /// Stable identifier used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::CorruptStore { .. } => "corrupt_store",
            Self::UnsupportedSchemaVersion { .. } => "unsupported_schema_version",
            Self::Serialize(_) => "serialize",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "state file I/O failed: {err}"),
            Self::CorruptStore { path, issue } => write!(
                f,
                "state file `{}` is corrupt: {issue}; run the doctor to diagnose and repair it",
                path.display()
            ),
            Self::UnsupportedSchemaVersion { found, latest } => write!(
                f,
                "state file schema version {found} is newer than supported {latest}"
            ),
            Self::Serialize(err) => write!(f, "failed to encode state: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::CorruptStore { .. } | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Full store contents: version, settings and the commitment ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub schema_version: u32,
    /// Carried over from files written by earlier releases; never interpreted.
    pub timezone: Option<String>,
    pub settings: Settings,
    pub ledger: Ledger,
}

impl Snapshot {
    /// Empty snapshot at the latest version with default settings.
    pub fn empty() -> Self {
        Self {
            schema_version: latest_version(),
            timezone: None,
            settings: Settings::default(),
            ledger: Ledger::default(),
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// How `Store::open` obtained its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No (or an empty) state file existed; a fresh one was written.
    Initialized,
    /// File was already at the latest layout.
    Loaded,
    /// File was upgraded from `from` and written back.
    Migrated { from: u32 },
}

/// Result of strictly decoding state-file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub snapshot: Snapshot,
    pub version: u32,
}

/// Decodes state-file bytes, migrating in memory to the latest layout.
///
/// Missing settings are filled with defaults. Any other structural problem is
/// returned as the first issue found.
pub fn decode(bytes: &[u8]) -> Result<Decoded, StoreIssue> {
    let raw = RawStore::parse(bytes).map_err(|err| StoreIssue::Undecodable(err.to_string()))?;
    let version = schema::detect_version(raw.version).map_err(schema_issue)?;

    let Some(days) = raw.days.as_ref() else {
        return Err(StoreIssue::MissingDays);
    };
    if let Some((date, occurrences)) = days.duplicates().into_iter().next() {
        return Err(StoreIssue::DuplicateDate { date, occurrences });
    }

    let record = raw
        .into_record()
        .map_err(|err| StoreIssue::Undecodable(err.to_string()))?;
    let migrated = schema::migrate(record, version).map_err(schema_issue)?;
    let snapshot = RawStore::from_record(migrated)
        .map_err(|err| StoreIssue::MigrationFailed(err.to_string()))?
        .into_snapshot()
        .map_err(|issues| {
            issues
                .into_iter()
                .next()
                .unwrap_or_else(|| StoreIssue::MigrationFailed("unknown layout error".to_string()))
        })?;

    Ok(Decoded { snapshot, version })
}

pub(crate) fn schema_issue(err: SchemaError) -> StoreIssue {
    match err {
        SchemaError::UnsupportedVersion { found, latest } => {
            StoreIssue::UnsupportedVersion { found, latest }
        }
        other => StoreIssue::MigrationFailed(other.to_string()),
    }
}

/// Encodes and atomically writes `snapshot` to `path`.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> StoreResult<()> {
    let started_at = Instant::now();
    let bytes = file::encode(snapshot)?;
    if let Err(err) = file::write_atomically(path, &bytes) {
        error!(
            "event=store_save module=store status=error error_code=io duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err.into());
    }
    debug!(
        "event=store_save module=store status=ok bytes={} entries={} duration_ms={}",
        bytes.len(),
        snapshot.ledger.len(),
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// Owner of the state file and of the in-memory snapshot.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    outcome: LoadOutcome,
    state: Mutex<Snapshot>,
}

impl Store {
    /// Opens the store at `path`, creating or upgrading the file as needed.
    ///
    /// # Errors
    /// - `CorruptStore` when the file is not a valid record at any known version.
    /// - `UnsupportedSchemaVersion` when the file was written by a newer release.
    /// - `Io` when reading or writing the file fails.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let started_at = Instant::now();
        info!("event=store_open module=store status=start");

        match load(&path) {
            Ok((snapshot, outcome)) => {
                info!(
                    "event=store_open module=store status=ok outcome={} version={} entries={} duration_ms={}",
                    outcome_name(outcome),
                    snapshot.schema_version,
                    snapshot.ledger.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(Self {
                    path,
                    outcome,
                    state: Mutex::new(snapshot),
                })
            }
            Err(err) => {
                error!(
                    "event=store_open module=store status=error error_code={} duration_ms={} error={}",
                    err.code(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_outcome(&self) -> LoadOutcome {
        self.outcome
    }

    /// Returns a copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings
    }

    /// Runs a read-only closure against the current snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&self.lock())
    }

    /// Writes `snapshot` to disk and adopts it as the current state.
    ///
    /// The file is always written at the latest layout version, whatever
    /// `schema_version` the caller left in the snapshot.
    pub fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let mut guard = self.lock();
        save_snapshot(&self.path, snapshot)?;
        *guard = Snapshot {
            schema_version: latest_version(),
            ..snapshot.clone()
        };
        Ok(())
    }

    /// Applies `f` to a working copy of the snapshot and persists it.
    ///
    /// The store lock is held from copy to commit, so only one mutation is in
    /// flight at a time. The working copy replaces the current state only after
    /// the file was written; on any error both stay as they were.
    pub fn with_mutation<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, E>,
        E: From<StoreError>,
    {
        let started_at = Instant::now();
        let mut guard = self.lock();
        let mut working = guard.clone();

        let value = match f(&mut working) {
            Ok(value) => value,
            Err(err) => {
                debug!(
                    "event=store_mutation module=store status=rejected duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                return Err(err);
            }
        };

        working.schema_version = latest_version();
        save_snapshot(&self.path, &working)?;
        *guard = working;
        debug!(
            "event=store_mutation module=store status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // The guarded snapshot is only replaced after a successful write, so a
        // panic inside a mutation cannot leave it half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load(path: &Path) -> StoreResult<(Snapshot, LoadOutcome)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(err.into()),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        let snapshot = Snapshot::empty();
        save_snapshot(path, &snapshot)?;
        return Ok((snapshot, LoadOutcome::Initialized));
    }

    let decoded = decode(&bytes).map_err(|issue| match issue {
        StoreIssue::UnsupportedVersion { found, latest } => {
            StoreError::UnsupportedSchemaVersion { found, latest }
        }
        issue => StoreError::CorruptStore {
            path: path.to_path_buf(),
            issue,
        },
    })?;

    if decoded.version < latest_version() {
        warn!(
            "event=store_migrate module=store status=start from={} to={} steps={}",
            decoded.version,
            latest_version(),
            schema::pending_steps(decoded.version).len()
        );
        save_snapshot(path, &decoded.snapshot)?;
        info!(
            "event=store_migrate module=store status=ok from={} to={}",
            decoded.version,
            latest_version()
        );
        return Ok((
            decoded.snapshot,
            LoadOutcome::Migrated {
                from: decoded.version,
            },
        ));
    }

    Ok((decoded.snapshot, LoadOutcome::Loaded))
}

fn outcome_name(outcome: LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Initialized => "initialized",
        LoadOutcome::Loaded => "loaded",
        LoadOutcome::Migrated { .. } => "migrated",
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, StoreIssue};

    #[test]
    fn decode_rejects_duplicate_dates() {
        let bytes = br#"{"version":2,"days":{"2024-01-01":{"title":"a"},"2024-01-01":{"title":"b"}}}"#;
        let err = decode(bytes).unwrap_err();
        assert_eq!(
            err,
            StoreIssue::DuplicateDate {
                date: "2024-01-01".to_string(),
                occurrences: 2
            }
        );
    }

    #[test]
    fn decode_fills_missing_settings_with_defaults() {
        let decoded = decode(br#"{"version":2,"days":{}}"#).unwrap();
        assert_eq!(decoded.snapshot.settings, Default::default());
        assert_eq!(decoded.version, 2);
    }

    #[test]
    fn decode_reports_missing_days() {
        assert_eq!(
            decode(br#"{"version":2,"settings":{}}"#).unwrap_err(),
            StoreIssue::MissingDays
        );
    }
}
