//! State-file diagnosis and repair.
//!
//! # Responsibility
//! - Classify raw state-file bytes as healthy, recoverable or unrecoverable,
//!   independent of whether `Store::open` would succeed.
//! - Build the repaired snapshot for recoverable files.
//! - Apply a repair only on explicit confirmation, after taking a backup.
//!
//! # Invariants
//! - Scanning never writes.
//! - An unrecoverable file is never modified, truncated or removed.
//! - Duplicate dates resolve to the later position in the file.
//!
//! # See also
//! - `crate::store::layout` for the lenient raw view scanned here.

use crate::model::commitment::{parse_date, CommitmentStatus};
use crate::model::settings::SettingsKey;
use crate::paths::StorePaths;
use crate::store::layout::{parse_timestamp, RawDay, RawDays, RawStore};
use crate::store::schema::{self, latest_version, FIRST_VERSION};
use crate::store::{save_snapshot, schema_issue, Snapshot, StoreError, StoreIssue};
use log::{info, warn};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub mod backup;
mod render;

pub use backup::BackupService;

/// Overall verdict of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    /// Only issues with a deterministic fix were found.
    Recoverable,
    /// At least one issue has no safe fix.
    Unrecoverable,
    /// No state file exists.
    Missing,
}

impl Health {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Recoverable => "recoverable",
            Self::Unrecoverable => "unrecoverable",
            Self::Missing => "missing",
        }
    }
}

impl Display for Health {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fixable,
    Unfixable,
    /// Reported but left as is.
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub issue: StoreIssue,
    pub severity: Severity,
}

impl Finding {
    fn fixable(issue: StoreIssue) -> Self {
        Self {
            issue,
            severity: Severity::Fixable,
        }
    }

    fn unfixable(issue: StoreIssue) -> Self {
        Self {
            issue,
            severity: Severity::Unfixable,
        }
    }

    fn advisory(issue: StoreIssue) -> Self {
        Self {
            issue,
            severity: Severity::Advisory,
        }
    }
}

/// Result of diagnosing raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub health: Health,
    /// Layout version the bytes were read as, when one could be detected.
    pub detected_version: Option<u32>,
    pub findings: Vec<Finding>,
    /// Present only when `health` is `Recoverable`.
    pub repaired: Option<Snapshot>,
}

impl Diagnosis {
    fn settle(
        detected_version: Option<u32>,
        findings: Vec<Finding>,
        repaired: Option<Snapshot>,
    ) -> Self {
        let has = |severity: Severity| findings.iter().any(|finding| finding.severity == severity);
        let health = if has(Severity::Unfixable) {
            Health::Unrecoverable
        } else if has(Severity::Fixable) {
            Health::Recoverable
        } else {
            Health::Healthy
        };
        Self {
            health,
            detected_version,
            repaired: repaired.filter(|_| health == Health::Recoverable),
            findings,
        }
    }
}

/// Suggested next step for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remedy {
    Nothing,
    ConfirmRepair,
    RestoreFromBackup,
    Initialize,
}

impl Display for Remedy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nothing => write!(f, "nothing to do"),
            Self::ConfirmRepair => write!(
                f,
                "confirm the repair to apply the fixes above; a backup is taken first"
            ),
            Self::RestoreFromBackup => write!(
                f,
                "the file was left untouched; restore it from a backup or fix it by hand"
            ),
            Self::Initialize => write!(f, "initialize a new state file"),
        }
    }
}

/// What a doctor run changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    NotAttempted,
    Repaired { backup: PathBuf },
    Initialized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub state_path: PathBuf,
    pub health: Health,
    pub detected_version: Option<u32>,
    pub findings: Vec<Finding>,
    pub outcome: RepairOutcome,
    repaired: Option<Snapshot>,
}

impl DoctorReport {
    fn from_diagnosis(state_path: &Path, diagnosis: Diagnosis) -> Self {
        Self {
            state_path: state_path.to_path_buf(),
            health: diagnosis.health,
            detected_version: diagnosis.detected_version,
            findings: diagnosis.findings,
            outcome: RepairOutcome::NotAttempted,
            repaired: diagnosis.repaired,
        }
    }

    fn missing(state_path: &Path) -> Self {
        Self {
            state_path: state_path.to_path_buf(),
            health: Health::Missing,
            detected_version: None,
            findings: Vec::new(),
            outcome: RepairOutcome::NotAttempted,
            repaired: None,
        }
    }

    /// Snapshot a confirmed repair would write.
    pub fn repaired_snapshot(&self) -> Option<&Snapshot> {
        self.repaired.as_ref()
    }

    pub fn findings_with(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(move |finding| finding.severity == severity)
    }

    pub fn remedy(&self) -> Remedy {
        if self.outcome != RepairOutcome::NotAttempted {
            return Remedy::Nothing;
        }
        match self.health {
            Health::Healthy => Remedy::Nothing,
            Health::Recoverable => Remedy::ConfirmRepair,
            Health::Unrecoverable => Remedy::RestoreFromBackup,
            Health::Missing => Remedy::Initialize,
        }
    }

    /// 0 healthy or repaired, 1 repair pending, 2 unrecoverable, 3 missing.
    pub fn exit_code(&self) -> i32 {
        if self.outcome != RepairOutcome::NotAttempted {
            return 0;
        }
        match self.health {
            Health::Healthy => 0,
            Health::Recoverable => 1,
            Health::Unrecoverable => 2,
            Health::Missing => 3,
        }
    }
}

#[derive(Debug)]
pub enum DoctorError {
    Store(StoreError),
    Io(io::Error),
    /// Repair requested for a file without a safe fix.
    NotRecoverable(Health),
    /// Repair requested without confirmation.
    NotConfirmed,
}

impl Display for DoctorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "doctor I/O failed: {err}"),
            Self::NotRecoverable(health) => {
                write!(f, "state file is {health}; refusing to repair")
            }
            Self::NotConfirmed => write!(f, "repair was not confirmed; nothing was written"),
        }
    }
}

impl Error for DoctorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for DoctorError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<io::Error> for DoctorError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Scan/repair driver for one state file.
#[derive(Debug, Clone)]
pub struct Doctor {
    state_path: PathBuf,
    backup_dir: PathBuf,
}

impl Doctor {
    pub fn new(state_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn from_paths(paths: &StorePaths) -> Self {
        Self::new(&paths.state_file, &paths.backup_dir)
    }

    /// Reads and diagnoses the state file without writing anything.
    pub fn scan(&self) -> Result<DoctorReport, DoctorError> {
        let started_at = Instant::now();
        let report = match fs::read(&self.state_path) {
            Ok(bytes) => DoctorReport::from_diagnosis(&self.state_path, diagnose(&bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                DoctorReport::missing(&self.state_path)
            }
            Err(err) => {
                warn!(
                    "event=doctor_scan module=doctor status=error error_code=io error={}",
                    err
                );
                return Err(err.into());
            }
        };

        info!(
            "event=doctor_scan module=doctor status=ok health={} version={} findings={} duration_ms={}",
            report.health,
            report
                .detected_version
                .map_or_else(|| "none".to_string(), |v| v.to_string()),
            report.findings.len(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Re-scans, then writes the repaired state if `confirmed`.
    ///
    /// A healthy file is returned unchanged. A missing file is initialized.
    ///
    /// # Errors
    /// - `NotRecoverable` for an unrecoverable file; nothing is written.
    /// - `NotConfirmed` when a write is needed but `confirmed` is false.
    pub fn repair(&self, confirmed: bool) -> Result<DoctorReport, DoctorError> {
        let mut report = self.scan()?;
        match report.health {
            Health::Healthy => return Ok(report),
            Health::Unrecoverable => return Err(DoctorError::NotRecoverable(report.health)),
            Health::Recoverable | Health::Missing if !confirmed => {
                return Err(DoctorError::NotConfirmed)
            }
            Health::Recoverable | Health::Missing => {}
        }

        let started_at = Instant::now();
        match report.repaired.as_ref() {
            Some(snapshot) => {
                let backups =
                    BackupService::new(&self.backup_dir, snapshot.settings.max_backup_files);
                let backup = backups.create_backup(&self.state_path)?;
                save_snapshot(&self.state_path, snapshot)?;
                report.outcome = RepairOutcome::Repaired { backup };
            }
            None => {
                save_snapshot(&self.state_path, &Snapshot::empty())?;
                report.outcome = RepairOutcome::Initialized;
            }
        }

        info!(
            "event=doctor_repair module=doctor status=ok health={} fixed={} duration_ms={}",
            report.health,
            report.findings_with(Severity::Fixable).count(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}

/// Diagnoses raw state-file bytes.
pub fn diagnose(bytes: &[u8]) -> Diagnosis {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Diagnosis::settle(
            None,
            vec![Finding::fixable(StoreIssue::EmptyFile)],
            Some(Snapshot::empty()),
        );
    }

    let mut raw = match RawStore::parse(bytes) {
        Ok(raw) => raw,
        Err(err) => {
            let issue = StoreIssue::Undecodable(err.to_string());
            return Diagnosis::settle(None, vec![Finding::unfixable(issue)], None);
        }
    };
    let version = match schema::detect_version(raw.version) {
        Ok(version) => version,
        Err(err) => {
            return Diagnosis::settle(None, vec![Finding::unfixable(schema_issue(err))], None)
        }
    };

    let mut findings = Vec::new();
    let latest = latest_version();
    if version < latest {
        findings.push(Finding::fixable(StoreIssue::OutdatedVersion {
            found: version,
            latest,
        }));
    }

    match raw.settings.as_mut() {
        Some(settings) => inspect_settings(settings, &mut findings),
        None if version > FIRST_VERSION => {
            findings.push(Finding::fixable(StoreIssue::MissingSettings))
        }
        None => {}
    }

    let days = raw.days.get_or_insert_with(|| {
        findings.push(Finding::fixable(StoreIssue::MissingDays));
        RawDays::default()
    });
    for (date, occurrences) in days.duplicates() {
        findings.push(Finding::fixable(StoreIssue::DuplicateDate { date, occurrences }));
    }
    days.dedup_keep_last();
    for (key, day) in days.0.iter_mut() {
        inspect_day(key, day, &mut findings);
    }

    if findings
        .iter()
        .any(|finding| finding.severity == Severity::Unfixable)
    {
        return Diagnosis::settle(Some(version), findings, None);
    }

    match rebuild(raw, version) {
        Ok(snapshot) => Diagnosis::settle(Some(version), findings, Some(snapshot)),
        Err(issues) => {
            findings.extend(issues.into_iter().map(Finding::unfixable));
            Diagnosis::settle(Some(version), findings, None)
        }
    }
}

fn rebuild(raw: RawStore, version: u32) -> Result<Snapshot, Vec<StoreIssue>> {
    let failed = |reason: String| vec![StoreIssue::MigrationFailed(reason)];
    let record = raw.into_record().map_err(|err| failed(err.to_string()))?;
    let migrated =
        schema::migrate(record, version).map_err(|err| vec![schema_issue(err)])?;
    RawStore::from_record(migrated)
        .map_err(|err| failed(err.to_string()))?
        .into_snapshot()
}

/// Drops settings values that would not load, so defaults take their place.
fn inspect_settings(settings: &mut Map<String, Value>, findings: &mut Vec<Finding>) {
    const LEGACY_PROMPT_KEY: &str = "auto_prompt_on_empty";

    if settings.contains_key(SettingsKey::PromptOnEmpty.as_str()) {
        if let Some(value) = settings.remove(LEGACY_PROMPT_KEY) {
            findings.push(Finding::fixable(StoreIssue::InvalidSetting {
                key: LEGACY_PROMPT_KEY.to_string(),
                value: value.to_string(),
            }));
        }
    }

    for key in SettingsKey::ALL {
        let names: &[&str] = match key {
            SettingsKey::PromptOnEmpty => &[LEGACY_PROMPT_KEY, "prompt_on_empty"],
            _ => &[key.as_str()],
        };
        for name in names {
            let Some(value) = settings.get(*name) else {
                continue;
            };
            if setting_value_ok(key, value) {
                continue;
            }
            findings.push(Finding::fixable(StoreIssue::InvalidSetting {
                key: (*name).to_string(),
                value: value.to_string(),
            }));
            settings.remove(*name);
        }
    }
}

fn setting_value_ok(key: SettingsKey, value: &Value) -> bool {
    match key {
        SettingsKey::PromptOnEmpty | SettingsKey::StrictMode => value.is_boolean(),
        SettingsKey::DefaultLogDays | SettingsKey::MaxBackupFiles => value
            .as_u64()
            .is_some_and(|n| n >= 1 && n <= u64::from(u32::MAX)),
    }
}

/// Records issues for one day and normalizes what has a deterministic fix.
fn inspect_day(key: &str, day: &mut RawDay, findings: &mut Vec<Finding>) {
    let date = key.to_string();

    if parse_date(key).is_none() {
        findings.push(Finding::unfixable(StoreIssue::InvalidDateKey(date.clone())));
    }

    if let Some(status) = day.status.as_deref() {
        if CommitmentStatus::parse(status).is_none() {
            match CommitmentStatus::parse(&status.trim().to_ascii_lowercase()) {
                Some(canonical) => {
                    findings.push(Finding::fixable(StoreIssue::StatusCase {
                        date: date.clone(),
                        found: status.to_string(),
                    }));
                    day.status = Some(canonical.as_str().to_string());
                }
                None => findings.push(Finding::unfixable(StoreIssue::UnknownStatus {
                    date: date.clone(),
                    found: status.to_string(),
                })),
            }
        }
    }

    let trimmed = day.title.trim();
    if trimmed.is_empty() {
        findings.push(Finding::advisory(StoreIssue::BlankTitle { date: date.clone() }));
    } else if trimmed.len() != day.title.len() {
        findings.push(Finding::fixable(StoreIssue::TitleWhitespace {
            date: date.clone(),
        }));
        day.title = trimmed.to_string();
    }

    if let Some(note) = day.note.as_deref() {
        if note.trim().is_empty() {
            findings.push(Finding::fixable(StoreIssue::BlankNote { date: date.clone() }));
            day.note = None;
        } else if note.trim_end().len() != note.len() {
            findings.push(Finding::fixable(StoreIssue::NoteWhitespace {
                date: date.clone(),
            }));
            day.note = Some(note.trim_end().to_string());
        }
    }

    let stamps = [
        ("created_at", day.created_at.as_deref()),
        ("completed_at", day.completed_at.as_deref()),
        ("skipped_at", day.skipped_at.as_deref()),
    ];
    for (field, value) in stamps {
        if let Some(value) = value.filter(|value| parse_timestamp(value).is_none()) {
            findings.push(Finding::unfixable(StoreIssue::InvalidTimestamp {
                date: date.clone(),
                field,
                value: value.to_string(),
            }));
        }
    }
}
