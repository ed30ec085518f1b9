//! Commitment domain model.
//!
//! # Responsibility
//! - Define the per-day commitment record and its lifecycle status.
//! - Provide the canonical calendar-date text format shared by store and ledger.
//!
//! # Invariants
//! - `date` is the ledger key; an entry never moves to another date.
//! - `status` leaves `Pending` at most once per entry lifetime.
//! - Notes are either `None` or contain non-whitespace text.
//!
//! # See also
//! - `crate::ledger` for lifecycle operations over entries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Canonical on-disk and user-facing date format (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Lifecycle state of one day's commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStatus {
    /// Declared but not resolved yet.
    Pending,
    /// Completed.
    Done,
    /// Deliberately not done.
    Skipped,
}

impl CommitmentStatus {
    pub const ALL: [CommitmentStatus; 3] = [Self::Pending, Self::Done, Self::Skipped];

    /// Stable lowercase name used in the state file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Skipped => "skipped",
        }
    }

    /// Parses the exact persisted spelling. Casing variants are rejected.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    /// Returns whether the status is terminal (`Done` or `Skipped`).
    pub fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for CommitmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One day's commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentEntry {
    /// Calendar day this commitment belongs to.
    pub date: NaiveDate,
    /// What the user committed to.
    pub title: String,
    pub status: CommitmentStatus,
    /// Optional free-text annotation.
    pub note: Option<String>,
    /// `None` for entries migrated from files that never recorded it.
    pub created_at: Option<DateTime<Utc>>,
    /// Set when the entry transitions to `Done`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the entry transitions to `Skipped`.
    pub skipped_at: Option<DateTime<Utc>>,
}

impl CommitmentEntry {
    /// Creates a pending entry stamped with `created_at`.
    pub fn pending(date: NaiveDate, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            date,
            title: title.into(),
            status: CommitmentStatus::Pending,
            note: None,
            created_at: Some(created_at),
            completed_at: None,
            skipped_at: None,
        }
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }

    /// Replaces the note, normalizing blank input to `None`.
    pub fn set_note(&mut self, note: Option<&str>) {
        self.note = normalize_note(note);
    }
}

/// Normalizes optional note text: trims trailing whitespace, maps blank to `None`.
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim_end)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// Parses a `YYYY-MM-DD` date, rejecting non-canonical spellings such as `2024-1-5`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, DATE_FORMAT).ok()?;
    (format_date(date) == value).then_some(date)
}

/// Formats a date in the canonical `YYYY-MM-DD` form.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::{normalize_note, parse_date, CommitmentStatus};
    use chrono::NaiveDate;

    #[test]
    fn parse_date_requires_canonical_form() {
        assert_eq!(
            parse_date("2024-01-05"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(parse_date("2024-1-5"), None);
        assert_eq!(parse_date("2024-02-30"), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn status_parse_is_exact() {
        assert_eq!(CommitmentStatus::parse("done"), Some(CommitmentStatus::Done));
        assert_eq!(CommitmentStatus::parse("DONE"), None);
        assert!(CommitmentStatus::Skipped.is_final());
        assert!(!CommitmentStatus::Pending.is_final());
    }

    #[test]
    fn blank_notes_normalize_to_none() {
        assert_eq!(normalize_note(Some("   ")), None);
        assert_eq!(normalize_note(Some("ok  ")), Some("ok".to_string()));
        assert_eq!(normalize_note(None), None);
    }
}
