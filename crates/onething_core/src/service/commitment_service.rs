//! Commitment use-case service.
//!
//! # Responsibility
//! - Run every ledger mutation through `Store::with_mutation` with the rule
//!   engine consulted first.
//! - Expose read views and settings configuration to callers.
//!
//! # Invariants
//! - A rejected mutation writes nothing and leaves the in-memory state as is.
//! - Log lines carry dates and outcomes only, never titles or notes.

use crate::ledger::{CommitmentResult, Ledger, LedgerRange};
use crate::model::commitment::CommitmentEntry;
use crate::model::settings::{Settings, SettingsError, SettingsKey};
use crate::report::MonthReport;
use crate::rules::{LogWindow, RuleContext, RuleEngine};
use crate::service::clock::{Clock, SystemClock};
use crate::store::{Snapshot, Store};
use chrono::NaiveDate;
use log::{info, warn};
use std::time::Instant;

/// Commitment service facade over one open store.
pub struct CommitmentService<'s, C: Clock = SystemClock> {
    store: &'s Store,
    rules: RuleEngine,
    clock: C,
}

impl<'s> CommitmentService<'s, SystemClock> {
    /// Creates a service using the wall clock and default rules.
    pub fn new(store: &'s Store) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<'s, C: Clock> CommitmentService<'s, C> {
    pub fn with_clock(store: &'s Store, clock: C) -> Self {
        Self {
            store,
            rules: RuleEngine::new(),
            clock,
        }
    }

    /// Replaces the rule engine, e.g. to change the future-date policy.
    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Creates or replaces the pending commitment for `date`.
    pub fn set(&self, date: NaiveDate, title: &str) -> CommitmentResult<CommitmentEntry> {
        self.mutate("commitment_set", date, |ledger, ctx| {
            ledger.set(ctx, date, title).cloned()
        })
    }

    pub fn mark_done(
        &self,
        date: NaiveDate,
        note: Option<&str>,
    ) -> CommitmentResult<CommitmentEntry> {
        self.mutate("commitment_done", date, |ledger, ctx| {
            ledger.mark_done(ctx, date, note).cloned()
        })
    }

    pub fn mark_skipped(
        &self,
        date: NaiveDate,
        note: Option<&str>,
    ) -> CommitmentResult<CommitmentEntry> {
        self.mutate("commitment_skip", date, |ledger, ctx| {
            ledger.mark_skipped(ctx, date, note).cloned()
        })
    }

    /// Replaces the note for `date`; blank text clears it.
    pub fn annotate(&self, date: NaiveDate, note: &str) -> CommitmentResult<CommitmentEntry> {
        self.mutate("commitment_annotate", date, |ledger, ctx| {
            ledger.annotate(ctx, date, note).cloned()
        })
    }

    pub fn rename(&self, date: NaiveDate, title: &str) -> CommitmentResult<CommitmentEntry> {
        self.mutate("commitment_rename", date, |ledger, ctx| {
            ledger.rename(ctx, date, title).cloned()
        })
    }

    pub fn lookup(&self, date: NaiveDate) -> Option<CommitmentEntry> {
        self.store.read(|snapshot| snapshot.ledger.lookup(date).cloned())
    }

    /// Owned copy of the entries within `[from, to]`, oldest first.
    pub fn range(&self, from: NaiveDate, to: NaiveDate) -> Vec<CommitmentEntry> {
        self.with_range(from, to, |range| range.iter().cloned().collect())
    }

    /// Owned copy of the entries inside the current log window, oldest first.
    pub fn recent(&self) -> Vec<CommitmentEntry> {
        self.with_recent(|range| range.iter().cloned().collect())
    }

    /// Runs `f` over a borrowed `[from, to]` view without copying entries.
    ///
    /// The view can be iterated any number of times while `f` runs; the store
    /// stays locked until it returns.
    pub fn with_range<R, F>(&self, from: NaiveDate, to: NaiveDate, f: F) -> R
    where
        F: FnOnce(LedgerRange<'_>) -> R,
    {
        self.store.read(|snapshot| f(snapshot.ledger.range(from, to)))
    }

    /// Like `with_range`, over the current log window.
    pub fn with_recent<R, F>(&self, f: F) -> R
    where
        F: FnOnce(LedgerRange<'_>) -> R,
    {
        let window = self.log_window();
        self.store.read(|snapshot| f(snapshot.ledger.recent(window)))
    }

    pub fn log_window(&self) -> LogWindow {
        self.rules
            .clamp_log_window(self.clock.today(), &self.store.settings())
    }

    pub fn should_prompt_for_today(&self) -> bool {
        let today = self.clock.today();
        self.store.read(|snapshot| {
            self.rules
                .should_prompt_for_today(today, &snapshot.settings, &snapshot.ledger)
        })
    }

    pub fn month_report(&self, year: i32, month: u32) -> CommitmentResult<MonthReport> {
        self.store
            .read(|snapshot| MonthReport::build(&snapshot.ledger, year, month))
    }

    pub fn settings(&self) -> Settings {
        self.store.settings()
    }

    /// Applies `f` to the settings and persists them if they remain valid.
    pub fn update_settings<F>(&self, f: F) -> CommitmentResult<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        self.configure("settings_update", |settings| {
            f(settings);
            settings.validate()
        })
    }

    /// Parses and applies one `key = value` change.
    pub fn set_setting(&self, key: &str, value: &str) -> CommitmentResult<Settings> {
        let key: SettingsKey = key.parse()?;
        self.configure("settings_set", |settings| settings.apply(key, value))
    }

    /// Restores one setting to its default.
    pub fn reset_setting(&self, key: SettingsKey) -> CommitmentResult<Settings> {
        self.configure("settings_reset", |settings| {
            settings.reset(key);
            Ok(())
        })
    }

    /// Restores every setting to its default.
    pub fn reset_settings(&self) -> CommitmentResult<Settings> {
        self.configure("settings_reset", |settings| {
            *settings = Settings::default();
            Ok(())
        })
    }

    fn mutate<T, F>(&self, event: &'static str, date: NaiveDate, f: F) -> CommitmentResult<T>
    where
        F: FnOnce(&mut Ledger, &RuleContext<'_>) -> CommitmentResult<T>,
    {
        let started_at = Instant::now();
        let today = self.clock.today();
        let now = self.clock.now();

        let result = self.store.with_mutation(|snapshot: &mut Snapshot| {
            let settings = snapshot.settings;
            let ctx = self.rules.context(&settings, today, now);
            f(&mut snapshot.ledger, &ctx)
        });

        match &result {
            Ok(_) => info!(
                "event={} module=service status=ok date={} duration_ms={}",
                event,
                date,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={} module=service status=error date={} error_code={} duration_ms={}",
                event,
                date,
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn configure<F>(&self, event: &'static str, f: F) -> CommitmentResult<Settings>
    where
        F: FnOnce(&mut Settings) -> Result<(), SettingsError>,
    {
        let result = self
            .store
            .with_mutation(|snapshot: &mut Snapshot| -> CommitmentResult<Settings> {
                f(&mut snapshot.settings)?;
                Ok(snapshot.settings)
            });

        match &result {
            Ok(settings) => info!(
                "event={} module=service status=ok strict_mode={} default_log_days={} prompt_on_empty={}",
                event, settings.strict_mode, settings.default_log_days, settings.prompt_on_empty
            ),
            Err(err) => warn!(
                "event={} module=service status=error error_code={}",
                event,
                err.code()
            ),
        }
        result
    }
}

