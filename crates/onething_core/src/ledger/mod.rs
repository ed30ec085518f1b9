//! Commitment ledger: date-keyed entries and their lifecycle operations.
//!
//! # Responsibility
//! - Own the ordered collection of commitment entries.
//! - Apply create/replace, status transitions, annotation and renaming.
//! - Provide lookup, date-range, recent-window and month views.
//!
//! # Invariants
//! - At most one entry per date (the map key is the entry date).
//! - Every mutation consults the supplied `RuleContext` before changing state;
//!   the ledger itself never reads settings.
//! - The strict-mode lock on an existing entry is checked before the date and
//!   the title, so a finalized entry always reports `EditLocked`.
//! - Titles are trimmed and never empty after a successful mutation.
//!
//! # See also
//! - `crate::rules` for the checks every mutation passes.

use crate::model::commitment::{CommitmentEntry, CommitmentStatus};
use crate::model::settings::SettingsError;
use crate::rules::{LogWindow, RuleContext, RuleViolation};
use crate::store::StoreError;
use chrono::{Datelike, NaiveDate};
use std::collections::btree_map::{self, Entry};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod range;

pub use range::{LedgerRange, RangeIter};

pub type CommitmentResult<T> = Result<T, CommitmentError>;

/// Errors surfaced by commitment operations.
#[derive(Debug)]
pub enum CommitmentError {
    /// Strict mode forbids editing a finalized entry.
    EditLocked {
        date: NaiveDate,
        status: CommitmentStatus,
    },
    /// No entry exists for the target date.
    NoCommitment(NaiveDate),
    /// The date may not be logged under the active future-date rule.
    InvalidDate { date: NaiveDate, today: NaiveDate },
    /// Status may only leave `Pending`.
    InvalidTransition {
        date: NaiveDate,
        from: CommitmentStatus,
        to: CommitmentStatus,
    },
    InvalidMonth { year: i32, month: u32 },
    /// Month text that is not in `YYYY-MM` form.
    MalformedMonth(String),
    EmptyTitle,
    Settings(SettingsError),
    Store(StoreError),
}

impl CommitmentError {
    /// Stable identifier used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EditLocked { .. } => "edit_locked",
            Self::NoCommitment(_) => "no_commitment",
            Self::InvalidDate { .. } => "invalid_date",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidMonth { .. } | Self::MalformedMonth(_) => "invalid_month",
            Self::EmptyTitle => "empty_title",
            Self::Settings(_) => "invalid_setting",
            Self::Store(err) => err.code(),
        }
    }
}

impl Display for CommitmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EditLocked { date, status } => write!(
                f,
                "commitment for {date} is {status} and locked by strict mode"
            ),
            Self::NoCommitment(date) => write!(f, "no commitment set for {date}"),
            Self::InvalidDate { date, today } => write!(
                f,
                "{date} is after today ({today}); future commitments cannot be logged"
            ),
            Self::InvalidTransition { date, from, to } => write!(
                f,
                "commitment for {date} is already {from}; cannot mark it {to}"
            ),
            Self::InvalidMonth { year, month } => write!(f, "{year}-{month:02} is not a month"),
            Self::MalformedMonth(value) => write!(f, "`{value}` is not a month; expected YYYY-MM"),
            Self::EmptyTitle => write!(f, "commitment title cannot be empty"),
            Self::Settings(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CommitmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Settings(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CommitmentError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<SettingsError> for CommitmentError {
    fn from(value: SettingsError) -> Self {
        Self::Settings(value)
    }
}

impl From<RuleViolation> for CommitmentError {
    fn from(value: RuleViolation) -> Self {
        match value {
            RuleViolation::EditLocked { date, status } => Self::EditLocked { date, status },
            RuleViolation::FutureDate { date, today } => Self::InvalidDate { date, today },
            RuleViolation::InvalidTransition { date, from, to } => {
                Self::InvalidTransition { date, from, to }
            }
        }
    }
}

/// Ordered collection of commitment entries keyed by date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<NaiveDate, CommitmentEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.entries.contains_key(&date)
    }

    pub fn lookup(&self, date: NaiveDate) -> Option<&CommitmentEntry> {
        self.entries.get(&date)
    }

    /// All entries, oldest first.
    pub fn iter(&self) -> btree_map::Values<'_, NaiveDate, CommitmentEntry> {
        self.entries.values()
    }

    /// Entries dated within `[from, to]`, oldest first. Inverted bounds yield nothing.
    pub fn range(&self, from: NaiveDate, to: NaiveDate) -> LedgerRange<'_> {
        LedgerRange::new(&self.entries, from, to)
    }

    /// Entries inside a recent log window.
    pub fn recent(&self, window: LogWindow) -> LedgerRange<'_> {
        self.range(window.from, window.to)
    }

    /// Every calendar day of a month paired with its entry, if any.
    pub fn month_days(
        &self,
        year: i32,
        month: u32,
    ) -> CommitmentResult<Vec<(NaiveDate, Option<&CommitmentEntry>)>> {
        let (first, last) = month_bounds(year, month)?;
        Ok(first
            .iter_days()
            .take_while(|day| *day <= last)
            .map(|day| (day, self.entries.get(&day)))
            .collect())
    }

    /// Inserts an entry decoded from disk, returning any entry it displaced.
    pub(crate) fn insert(&mut self, entry: CommitmentEntry) -> Option<CommitmentEntry> {
        self.entries.insert(entry.date, entry)
    }

    /// Creates or replaces the pending commitment for `date`.
    pub fn set(
        &mut self,
        ctx: &RuleContext<'_>,
        date: NaiveDate,
        title: &str,
    ) -> CommitmentResult<&CommitmentEntry> {
        if let Some(existing) = self.entries.get(&date) {
            ctx.check_edit(existing)?;
        }
        let title = normalize_title(title)?;
        ctx.check_date(date)?;
        let entry = CommitmentEntry::pending(date, title, ctx.now());

        match self.entries.entry(date) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                Ok(occupied.into_mut())
            }
            Entry::Vacant(vacant) => Ok(vacant.insert(entry)),
        }
    }

    /// Marks the pending commitment for `date` as done, optionally annotating it.
    pub fn mark_done(
        &mut self,
        ctx: &RuleContext<'_>,
        date: NaiveDate,
        note: Option<&str>,
    ) -> CommitmentResult<&CommitmentEntry> {
        self.transition(ctx, date, CommitmentStatus::Done, note)
    }

    /// Marks the pending commitment for `date` as skipped, optionally annotating it.
    pub fn mark_skipped(
        &mut self,
        ctx: &RuleContext<'_>,
        date: NaiveDate,
        note: Option<&str>,
    ) -> CommitmentResult<&CommitmentEntry> {
        self.transition(ctx, date, CommitmentStatus::Skipped, note)
    }

    /// Replaces the note; blank text clears it.
    pub fn annotate(
        &mut self,
        ctx: &RuleContext<'_>,
        date: NaiveDate,
        note: &str,
    ) -> CommitmentResult<&CommitmentEntry> {
        let entry = self.editable(ctx, date)?;
        entry.set_note(Some(note));
        Ok(entry)
    }

    pub fn rename(
        &mut self,
        ctx: &RuleContext<'_>,
        date: NaiveDate,
        title: &str,
    ) -> CommitmentResult<&CommitmentEntry> {
        let entry = self.editable(ctx, date)?;
        entry.title = normalize_title(title)?;
        Ok(entry)
    }

    fn transition(
        &mut self,
        ctx: &RuleContext<'_>,
        date: NaiveDate,
        target: CommitmentStatus,
        note: Option<&str>,
    ) -> CommitmentResult<&CommitmentEntry> {
        let entry = self.editable(ctx, date)?;
        ctx.check_transition(entry, target)?;

        entry.status = target;
        match target {
            CommitmentStatus::Done => entry.completed_at = Some(ctx.now()),
            CommitmentStatus::Skipped => entry.skipped_at = Some(ctx.now()),
            CommitmentStatus::Pending => {}
        }
        if note.is_some() {
            entry.set_note(note);
        }
        Ok(entry)
    }

    fn editable(
        &mut self,
        ctx: &RuleContext<'_>,
        date: NaiveDate,
    ) -> CommitmentResult<&mut CommitmentEntry> {
        let entry = self
            .entries
            .get_mut(&date)
            .ok_or(CommitmentError::NoCommitment(date))?;
        ctx.check_edit(entry)?;
        ctx.check_date(date)?;
        Ok(entry)
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a CommitmentEntry;
    type IntoIter = btree_map::Values<'a, NaiveDate, CommitmentEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn normalize_title(title: &str) -> CommitmentResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CommitmentError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

/// First and last calendar day of a month.
pub fn month_bounds(year: i32, month: u32) -> CommitmentResult<(NaiveDate, NaiveDate)> {
    let invalid = || CommitmentError::InvalidMonth { year, month };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next_first
        .and_then(|next| next.pred_opt())
        .ok_or_else(invalid)?;
    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::{month_bounds, CommitmentError, Ledger};
    use crate::model::commitment::CommitmentStatus;
    use crate::model::settings::Settings;
    use crate::rules::RuleEngine;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn set_replaces_existing_entry_for_same_date() {
        let engine = RuleEngine::new();
        let settings = Settings::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let ctx = engine.context(&settings, day(10), now);
        let mut ledger = Ledger::new();

        ledger.set(&ctx, day(1), "  Run 5k ").unwrap();
        ledger.mark_done(&ctx, day(1), None).unwrap();
        ledger.set(&ctx, day(1), "Swim").unwrap();

        let entry = ledger.lookup(day(1)).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(entry.title, "Swim");
        assert_eq!(entry.status, CommitmentStatus::Pending);
        assert_eq!(entry.completed_at, None);
    }

    #[test]
    fn transition_requires_pending_entry() {
        let engine = RuleEngine::new();
        let settings = Settings::default();
        let ctx = engine.context(&settings, day(10), Utc::now());
        let mut ledger = Ledger::new();

        ledger.set(&ctx, day(2), "Read").unwrap();
        ledger.mark_skipped(&ctx, day(2), Some("sick")).unwrap();
        let err = ledger.mark_done(&ctx, day(2), None).unwrap_err();

        assert!(matches!(
            err,
            CommitmentError::InvalidTransition {
                from: CommitmentStatus::Skipped,
                to: CommitmentStatus::Done,
                ..
            }
        ));
        assert_eq!(ledger.lookup(day(2)).unwrap().note.as_deref(), Some("sick"));
    }

    #[test]
    fn empty_titles_are_rejected() {
        let engine = RuleEngine::new();
        let settings = Settings::default();
        let ctx = engine.context(&settings, day(10), Utc::now());
        let mut ledger = Ledger::new();

        assert!(matches!(
            ledger.set(&ctx, day(3), "   "),
            Err(CommitmentError::EmptyTitle)
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn strict_lock_wins_over_date_and_title_checks() {
        let engine = RuleEngine::new();
        let relaxed = Settings::default();
        let strict = Settings {
            strict_mode: true,
            ..Settings::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let mut ledger = Ledger::new();
        {
            let ctx = engine.context(&relaxed, day(10), now);
            ledger.set(&ctx, day(12), "Plan ahead").unwrap();
            ledger.mark_done(&ctx, day(12), None).unwrap();
            ledger.set(&ctx, day(9), "Read").unwrap();
            ledger.mark_skipped(&ctx, day(9), None).unwrap();
        }
        let ctx = engine.context(&strict, day(10), now);

        for date in [day(12), day(9)] {
            assert!(matches!(
                ledger.set(&ctx, date, " "),
                Err(CommitmentError::EditLocked { .. })
            ));
            assert!(matches!(
                ledger.rename(&ctx, date, "  "),
                Err(CommitmentError::EditLocked { .. })
            ));
            assert!(matches!(
                ledger.annotate(&ctx, date, "late note"),
                Err(CommitmentError::EditLocked { .. })
            ));
        }
        assert_eq!(ledger.lookup(day(12)).unwrap().title, "Plan ahead");
    }

    #[test]
    fn range_is_restartable_and_handles_inverted_bounds() {
        let engine = RuleEngine::new();
        let settings = Settings::default();
        let ctx = engine.context(&settings, day(31), Utc::now());
        let mut ledger = Ledger::new();
        for d in [5, 1, 3, 9] {
            ledger.set(&ctx, day(d), "x").unwrap();
        }

        let range = ledger.range(day(2), day(9));
        let first: Vec<_> = range.iter().map(|entry| entry.date).collect();
        let second: Vec<_> = range.into_iter().map(|entry| entry.date).collect();
        assert_eq!(first, vec![day(3), day(5), day(9)]);
        assert_eq!(first, second);

        assert!(ledger.range(day(9), day(2)).is_empty());
    }

    #[test]
    fn month_bounds_handle_december_and_leap_years() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(2023, 12).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        assert!(matches!(
            month_bounds(2024, 13),
            Err(CommitmentError::InvalidMonth { month: 13, .. })
        ));
    }
}
