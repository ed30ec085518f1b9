//! State-file schema registry and migration executor.
//!
//! # Responsibility
//! - Register one upgrade step per consecutive pair of layout versions.
//! - Detect the layout version of a raw record.
//! - Upgrade raw records to the latest layout without touching disk.
//!
//! # Invariants
//! - Steps are ordered by `from` and each one produces exactly `from + 1`.
//! - Steps are pure: same input record, same output record.
//! - Only structural corruption makes a step fail.
//!
//! # See also
//! - `crate::store::layout` for typed conversion after migration.

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod v2;

/// Oldest layout this binary can read.
pub const FIRST_VERSION: u32 = 1;

/// Name of the top-level version tag in every layout.
pub const VERSION_FIELD: &str = "version";

type UpgradeFn = fn(&mut Map<String, Value>) -> Result<(), String>;

#[derive(Clone, Copy)]
struct SchemaStep {
    from: u32,
    description: &'static str,
    upgrade: UpgradeFn,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    from: 1,
    description: "add per-day notes and the settings block",
    upgrade: v2::upgrade_from_v1,
}];

pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    UnsupportedVersion { found: u32, latest: u32 },
    NotAnObject,
    StepFailed { from: u32, reason: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedVersion { found, latest } => write!(
                f,
                "state file schema version {found} is not supported (known versions {FIRST_VERSION}..={latest})"
            ),
            Self::NotAnObject => write!(f, "state record is not a JSON object"),
            Self::StepFailed { from, reason } => write!(
                f,
                "migration from version {from} to {} failed: {reason}",
                from + 1
            ),
        }
    }
}

impl Error for SchemaError {}

/// Returns the latest layout version known by this binary.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(FIRST_VERSION, |step| step.from + 1)
}

/// Iterates known layout versions from newest to oldest.
pub fn known_versions_descending() -> impl Iterator<Item = u32> {
    (FIRST_VERSION..=latest_version()).rev()
}

/// Resolves the layout version of a record from its version tag.
///
/// A missing tag is read as the first layout, which predates explicit tagging.
/// Candidates are tried newest first.
pub fn detect_version(tag: Option<u32>) -> SchemaResult<u32> {
    let found = tag.unwrap_or(FIRST_VERSION);
    known_versions_descending()
        .find(|version| *version == found)
        .ok_or(SchemaError::UnsupportedVersion {
            found,
            latest: latest_version(),
        })
}

/// Human-readable descriptions of the steps that upgrading from `from` would run.
pub fn pending_steps(from: u32) -> Vec<&'static str> {
    STEPS
        .iter()
        .filter(|step| step.from >= from)
        .map(|step| step.description)
        .collect()
}

/// Upgrades `record` from layout `from` to the latest layout.
///
/// Records already at the latest layout are returned unchanged, so applying
/// this to its own output is a no-op.
pub fn migrate(mut record: Value, from: u32) -> SchemaResult<Value> {
    detect_version(Some(from))?;
    let object = record.as_object_mut().ok_or(SchemaError::NotAnObject)?;

    for step in STEPS.iter().filter(|step| step.from >= from) {
        (step.upgrade)(object).map_err(|reason| SchemaError::StepFailed {
            from: step.from,
            reason,
        })?;
        object.insert(VERSION_FIELD.to_string(), Value::from(step.from + 1));
    }

    Ok(record)
}
