//! Rule engine: the single authority on what the ledger may do.
//!
//! # Responsibility
//! - Gate edits of finalized entries under strict mode.
//! - Allow status transitions only out of `Pending`.
//! - Apply the future-date policy.
//! - Compute the recent log window and the empty-day prompt decision.
//!
//! # Invariants
//! - Every check is a pure function of its inputs; nothing here touches the store.
//! - Strict mode always forbids future-dated mutations regardless of policy.

use crate::ledger::Ledger;
use crate::model::commitment::{CommitmentEntry, CommitmentStatus};
use crate::model::settings::Settings;
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How future-dated mutations are treated when strict mode is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FutureDatePolicy {
    /// Planning ahead is allowed unless strict mode is on.
    #[default]
    AllowOutsideStrictMode,
    /// Future dates are rejected in every mode.
    AlwaysForbid,
}

/// A rule the requested mutation would break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    EditLocked {
        date: NaiveDate,
        status: CommitmentStatus,
    },
    FutureDate {
        date: NaiveDate,
        today: NaiveDate,
    },
    InvalidTransition {
        date: NaiveDate,
        from: CommitmentStatus,
        to: CommitmentStatus,
    },
}

impl Display for RuleViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EditLocked { date, status } => {
                write!(f, "entry for {date} is {status} and locked")
            }
            Self::FutureDate { date, today } => {
                write!(f, "{date} is in the future (today is {today})")
            }
            Self::InvalidTransition { date, from, to } => {
                write!(f, "entry for {date} cannot move from {from} to {to}")
            }
        }
    }
}

impl Error for RuleViolation {}

/// Inclusive date bounds of the recent log view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl LogWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine {
    future_dates: FutureDatePolicy,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_future_date_policy(policy: FutureDatePolicy) -> Self {
        Self {
            future_dates: policy,
        }
    }

    pub fn future_date_policy(&self) -> FutureDatePolicy {
        self.future_dates
    }

    /// True iff prompting is enabled and `today` has no entry yet.
    pub fn should_prompt_for_today(
        &self,
        today: NaiveDate,
        settings: &Settings,
        ledger: &Ledger,
    ) -> bool {
        settings.prompt_on_empty && !ledger.contains(today)
    }

    /// Gate for any change to an existing entry.
    pub fn check_edit_allowed(
        &self,
        entry: &CommitmentEntry,
        settings: &Settings,
    ) -> Result<(), RuleViolation> {
        if settings.strict_mode && entry.is_final() {
            return Err(RuleViolation::EditLocked {
                date: entry.date,
                status: entry.status,
            });
        }
        Ok(())
    }

    pub fn check_transition(
        &self,
        entry: &CommitmentEntry,
        target: CommitmentStatus,
    ) -> Result<(), RuleViolation> {
        if entry.status != CommitmentStatus::Pending || target == CommitmentStatus::Pending {
            return Err(RuleViolation::InvalidTransition {
                date: entry.date,
                from: entry.status,
                to: target,
            });
        }
        Ok(())
    }

    pub fn check_date_allowed(
        &self,
        date: NaiveDate,
        today: NaiveDate,
        settings: &Settings,
    ) -> Result<(), RuleViolation> {
        if date <= today {
            return Ok(());
        }
        let forbidden = settings.strict_mode || self.future_dates == FutureDatePolicy::AlwaysForbid;
        if forbidden {
            return Err(RuleViolation::FutureDate { date, today });
        }
        Ok(())
    }

    /// `[today - default_log_days, today]`, saturating at the earliest representable date.
    pub fn clamp_log_window(&self, today: NaiveDate, settings: &Settings) -> LogWindow {
        let from = today
            .checked_sub_days(Days::new(u64::from(settings.default_log_days)))
            .unwrap_or(NaiveDate::MIN);
        LogWindow { from, to: today }
    }

    /// Binds the engine to the settings and clock reading of one mutation.
    pub fn context<'a>(
        &'a self,
        settings: &'a Settings,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> RuleContext<'a> {
        RuleContext {
            engine: self,
            settings,
            today,
            now,
        }
    }
}

/// Rule checks bound to one mutation's settings and clock reading.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    engine: &'a RuleEngine,
    settings: &'a Settings,
    today: NaiveDate,
    now: DateTime<Utc>,
}

impl RuleContext<'_> {
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn check_date(&self, date: NaiveDate) -> Result<(), RuleViolation> {
        self.engine
            .check_date_allowed(date, self.today, self.settings)
    }

    pub fn check_edit(&self, entry: &CommitmentEntry) -> Result<(), RuleViolation> {
        self.engine.check_edit_allowed(entry, self.settings)
    }

    pub fn check_transition(
        &self,
        entry: &CommitmentEntry,
        target: CommitmentStatus,
    ) -> Result<(), RuleViolation> {
        self.engine.check_transition(entry, target)
    }
}

#[cfg(test)]
mod tests {
    use super::{FutureDatePolicy, RuleEngine, RuleViolation};
    use crate::ledger::Ledger;
    use crate::model::commitment::{CommitmentEntry, CommitmentStatus};
    use crate::model::settings::Settings;
    use chrono::{NaiveDate, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn strict() -> Settings {
        Settings {
            strict_mode: true,
            ..Settings::default()
        }
    }

    #[test]
    fn strict_mode_locks_only_final_entries() {
        let engine = RuleEngine::new();
        let mut entry = CommitmentEntry::pending(date(2024, 1, 1), "Run", Utc::now());
        assert!(engine.check_edit_allowed(&entry, &strict()).is_ok());

        entry.status = CommitmentStatus::Done;
        assert_eq!(
            engine.check_edit_allowed(&entry, &strict()),
            Err(RuleViolation::EditLocked {
                date: date(2024, 1, 1),
                status: CommitmentStatus::Done
            })
        );
        assert!(engine
            .check_edit_allowed(&entry, &Settings::default())
            .is_ok());
    }

    #[test]
    fn transitions_only_leave_pending() {
        let engine = RuleEngine::new();
        let mut entry = CommitmentEntry::pending(date(2024, 1, 1), "Run", Utc::now());
        assert!(engine
            .check_transition(&entry, CommitmentStatus::Skipped)
            .is_ok());
        assert!(engine
            .check_transition(&entry, CommitmentStatus::Pending)
            .is_err());

        entry.status = CommitmentStatus::Skipped;
        assert!(engine
            .check_transition(&entry, CommitmentStatus::Done)
            .is_err());
    }

    #[test]
    fn future_dates_follow_mode_and_policy() {
        let today = date(2024, 3, 10);
        let tomorrow = date(2024, 3, 11);
        let relaxed = RuleEngine::new();
        let forbid = RuleEngine::with_future_date_policy(FutureDatePolicy::AlwaysForbid);

        assert!(relaxed
            .check_date_allowed(tomorrow, today, &Settings::default())
            .is_ok());
        assert!(relaxed.check_date_allowed(tomorrow, today, &strict()).is_err());
        assert!(forbid
            .check_date_allowed(tomorrow, today, &Settings::default())
            .is_err());
        assert!(forbid.check_date_allowed(today, today, &strict()).is_ok());
    }

    #[test]
    fn log_window_spans_default_log_days_back_from_today() {
        let engine = RuleEngine::new();
        let settings = Settings {
            default_log_days: 3,
            ..Settings::default()
        };
        let window = engine.clamp_log_window(date(2024, 3, 2), &settings);
        assert_eq!(window.from, date(2024, 2, 28));
        assert_eq!(window.to, date(2024, 3, 2));
        assert!(window.contains(date(2024, 2, 29)));
        assert!(!window.contains(date(2024, 3, 3)));
    }

    #[test]
    fn prompt_is_owed_only_for_empty_day_when_enabled() {
        let engine = RuleEngine::new();
        let today = date(2024, 1, 1);
        let ledger = Ledger::new();
        assert!(engine.should_prompt_for_today(today, &Settings::default(), &ledger));

        let quiet = Settings {
            prompt_on_empty: false,
            ..Settings::default()
        };
        assert!(!engine.should_prompt_for_today(today, &quiet, &ledger));
    }
}
