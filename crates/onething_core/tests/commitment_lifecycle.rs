use chrono::NaiveDate;
use onething_core::{
    CommitmentError, CommitmentService, CommitmentStatus, FixedClock, FutureDatePolicy,
    RuleEngine, SettingsError, SettingsKey, Store,
};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("one_thing.json")).unwrap();
    (dir, store)
}

#[test]
fn prompt_is_owed_until_today_has_a_commitment() {
    let (_dir, store) = open_store();
    let today = date(2024, 1, 1);
    let service = CommitmentService::with_clock(&store, FixedClock::on(today));

    assert!(service.should_prompt_for_today());
    service.set(today, "Run 5k").unwrap();
    assert!(!service.should_prompt_for_today());
}

#[test]
fn prompt_is_suppressed_when_disabled() {
    let (_dir, store) = open_store();
    let service = CommitmentService::with_clock(&store, FixedClock::on(date(2024, 1, 1)));

    service.set_setting("auto_prompt_on_empty", "false").unwrap();

    assert!(!service.should_prompt_for_today());
}

#[test]
fn mark_done_records_status_note_and_completion_time() {
    let (_dir, store) = open_store();
    let clock = FixedClock::on(date(2024, 1, 2));
    let service = CommitmentService::with_clock(&store, clock);
    service.set(date(2024, 1, 1), "Run 5k").unwrap();

    let entry = service
        .mark_done(date(2024, 1, 1), Some("felt great"))
        .unwrap();

    assert_eq!(entry.status, CommitmentStatus::Done);
    assert_eq!(entry.note.as_deref(), Some("felt great"));
    assert!(entry.completed_at.is_some());
    assert_eq!(entry.skipped_at, None);
    assert_eq!(service.lookup(date(2024, 1, 1)), Some(entry));
}

#[test]
fn marking_a_missing_day_reports_no_commitment() {
    let (_dir, store) = open_store();
    let service = CommitmentService::with_clock(&store, FixedClock::on(date(2024, 1, 2)));

    let err = service.mark_skipped(date(2024, 1, 1), None).unwrap_err();

    assert!(matches!(err, CommitmentError::NoCommitment(d) if d == date(2024, 1, 1)));
    assert!(store.snapshot().ledger.is_empty());
}

#[test]
fn finalized_entries_cannot_transition_again_in_relaxed_mode() {
    let (_dir, store) = open_store();
    let service = CommitmentService::with_clock(&store, FixedClock::on(date(2024, 1, 5)));
    service.set(date(2024, 1, 5), "Read").unwrap();
    service.mark_skipped(date(2024, 1, 5), Some("tired")).unwrap();

    let err = service.mark_done(date(2024, 1, 5), None).unwrap_err();
    assert!(matches!(err, CommitmentError::InvalidTransition { .. }));

    let renamed = service.rename(date(2024, 1, 5), "Read a chapter").unwrap();
    assert_eq!(renamed.title, "Read a chapter");
    assert_eq!(renamed.status, CommitmentStatus::Skipped);
}

#[test]
fn strict_mode_locks_finalized_entries_for_every_edit() {
    let (_dir, store) = open_store();
    let day = date(2024, 2, 1);
    let service = CommitmentService::with_clock(&store, FixedClock::on(day));
    service.set(day, "Deep work").unwrap();
    service.mark_done(day, Some("done early")).unwrap();
    service.set_setting("strict_mode", "true").unwrap();
    let before = service.lookup(day).unwrap();

    let attempts = [
        service.rename(day, "new title").unwrap_err(),
        service.set(day, "replacement").unwrap_err(),
        service.annotate(day, "edited").unwrap_err(),
        service.mark_skipped(day, None).unwrap_err(),
    ];

    for err in attempts {
        assert!(
            matches!(err, CommitmentError::EditLocked { status: CommitmentStatus::Done, .. }),
            "unexpected error: {err}"
        );
    }
    assert_eq!(service.lookup(day), Some(before));
}

#[test]
fn strict_lock_is_reported_for_future_entries_and_blank_titles() {
    let (_dir, store) = open_store();
    let today = date(2024, 3, 10);
    let planned = date(2024, 3, 12);
    let yesterday = date(2024, 3, 9);
    let service = CommitmentService::with_clock(&store, FixedClock::on(today));
    service.set(planned, "Race day").unwrap();
    service.mark_done(planned, None).unwrap();
    service.set(yesterday, "Stretch").unwrap();
    service.mark_done(yesterday, None).unwrap();
    service.set_setting("strict_mode", "true").unwrap();

    let attempts = [
        service.rename(planned, "moved").unwrap_err(),
        service.annotate(planned, "note").unwrap_err(),
        service.set(planned, "replacement").unwrap_err(),
        service.rename(yesterday, "  ").unwrap_err(),
        service.set(yesterday, "").unwrap_err(),
    ];

    for err in attempts {
        assert!(
            matches!(err, CommitmentError::EditLocked { status: CommitmentStatus::Done, .. }),
            "unexpected error: {err}"
        );
    }
}

#[test]
fn range_reads_can_walk_the_view_twice() {
    let (_dir, store) = open_store();
    let today = date(2024, 4, 10);
    let service = CommitmentService::with_clock(&store, FixedClock::on(today));
    for day in [2, 5, 9] {
        service.set(date(2024, 4, day), "x").unwrap();
    }

    let (first, second) = service.with_range(date(2024, 4, 3), today, |range| {
        let first: Vec<_> = range.iter().map(|entry| entry.date).collect();
        let second: Vec<_> = range.iter().map(|entry| entry.date).collect();
        (first, second)
    });
    assert_eq!(first, vec![date(2024, 4, 5), date(2024, 4, 9)]);
    assert_eq!(first, second);

    service.set_setting("default_log_days", "30").unwrap();
    let recent = service.with_recent(|range| range.iter().count());
    assert_eq!(recent, 3);
}

#[test]
fn strict_mode_still_allows_pending_edits() {
    let (_dir, store) = open_store();
    let day = date(2024, 2, 1);
    let service = CommitmentService::with_clock(&store, FixedClock::on(day));
    service.set_setting("strict_mode", "on").unwrap();

    service.set(day, "Draft").unwrap();
    service.annotate(day, "outline first").unwrap();
    let entry = service.rename(day, "Draft intro").unwrap();

    assert_eq!(entry.title, "Draft intro");
    assert_eq!(entry.note.as_deref(), Some("outline first"));
}

#[test]
fn future_dates_depend_on_strict_mode_and_policy() {
    let (_dir, store) = open_store();
    let today = date(2024, 6, 1);
    let tomorrow = date(2024, 6, 2);
    let service = CommitmentService::with_clock(&store, FixedClock::on(today));

    service.set(tomorrow, "Plan ahead").unwrap();

    service.set_setting("strict_mode", "true").unwrap();
    let err = service.set(date(2024, 6, 3), "Too early").unwrap_err();
    assert!(matches!(err, CommitmentError::InvalidDate { today: t, .. } if t == today));
    let err = service.mark_done(tomorrow, None).unwrap_err();
    assert!(matches!(err, CommitmentError::InvalidDate { .. }));

    service.set_setting("strict_mode", "false").unwrap();
    let forbidding = CommitmentService::with_clock(&store, FixedClock::on(today))
        .with_rules(RuleEngine::with_future_date_policy(FutureDatePolicy::AlwaysForbid));
    let err = forbidding.set(date(2024, 6, 3), "Still early").unwrap_err();
    assert!(matches!(err, CommitmentError::InvalidDate { .. }));
    assert!(forbidding.set(today, "Today is fine").is_ok());
}

#[test]
fn titles_are_trimmed_and_blank_notes_clear() {
    let (_dir, store) = open_store();
    let day = date(2024, 3, 3);
    let service = CommitmentService::with_clock(&store, FixedClock::on(day));

    let entry = service.set(day, "  Walk the dog  ").unwrap();
    assert_eq!(entry.title, "Walk the dog");

    service.annotate(day, "around the lake").unwrap();
    let cleared = service.annotate(day, "   ").unwrap();
    assert_eq!(cleared.note, None);

    let err = service.rename(day, "\t").unwrap_err();
    assert!(matches!(err, CommitmentError::EmptyTitle));
}

#[test]
fn recent_window_follows_default_log_days() {
    let (_dir, store) = open_store();
    let today = date(2024, 3, 20);
    let service = CommitmentService::with_clock(&store, FixedClock::on(today));
    for day in [1, 10, 16, 17, 20] {
        service.set(date(2024, 3, day), "x").unwrap();
    }

    service.set_setting("default_log_days", "4").unwrap();

    let window = service.log_window();
    assert_eq!(window.from, date(2024, 3, 16));
    let recent: Vec<_> = service.recent().into_iter().map(|entry| entry.date).collect();
    assert_eq!(recent, vec![date(2024, 3, 16), date(2024, 3, 17), date(2024, 3, 20)]);

    let all: Vec<_> = service
        .range(date(2024, 3, 1), today)
        .into_iter()
        .map(|entry| entry.date)
        .collect();
    assert_eq!(all.len(), 5);
    assert!(service.range(today, date(2024, 3, 1)).is_empty());
}

#[test]
fn settings_changes_are_validated_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one_thing.json");
    let store = Store::open(&path).unwrap();
    let service = CommitmentService::with_clock(&store, FixedClock::on(date(2024, 1, 1)));

    let err = service.set_setting("colour", "blue").unwrap_err();
    assert!(matches!(err, CommitmentError::Settings(SettingsError::UnknownKey(_))));
    let err = service.set_setting("max_backup_files", "0").unwrap_err();
    assert!(matches!(err, CommitmentError::Settings(SettingsError::InvalidValue { .. })));
    let err = service
        .update_settings(|settings| settings.default_log_days = 0)
        .unwrap_err();
    assert_eq!(err.code(), "invalid_setting");
    assert_eq!(service.settings().default_log_days, 7);

    service.set_setting("max_backup_files", "9").unwrap();
    service
        .update_settings(|settings| settings.strict_mode = true)
        .unwrap();
    service.reset_setting(SettingsKey::MaxBackupFiles).unwrap();
    drop(service);
    drop(store);

    let reopened = Store::open(&path).unwrap();
    let settings = reopened.settings();
    assert!(settings.strict_mode);
    assert_eq!(settings.max_backup_files, 5);

    let service = CommitmentService::with_clock(&reopened, FixedClock::on(date(2024, 1, 1)));
    assert!(!service.reset_settings().unwrap().strict_mode);
}

#[test]
fn month_report_counts_statuses() {
    let (_dir, store) = open_store();
    let service = CommitmentService::with_clock(&store, FixedClock::on(date(2024, 3, 1)));
    for day in 1..=4 {
        service.set(date(2024, 2, day), "habit").unwrap();
    }
    service.mark_done(date(2024, 2, 1), None).unwrap();
    service.mark_done(date(2024, 2, 2), None).unwrap();
    service.mark_skipped(date(2024, 2, 3), None).unwrap();
    service.set(date(2024, 3, 1), "other month").unwrap();

    let report = service.month_report(2024, 2).unwrap();

    assert_eq!(report.days_in_month, 29);
    assert_eq!(report.committed, 4);
    assert_eq!((report.done, report.skipped, report.pending), (2, 1, 1));
    assert_eq!(report.uncommitted(), 25);
    assert!((report.completion_rate() - 0.5).abs() < f64::EPSILON);
    assert!(matches!(
        service.month_report(2024, 0),
        Err(CommitmentError::InvalidMonth { .. })
    ));
}
