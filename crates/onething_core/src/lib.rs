//! Core of the One Thing daily-commitment tracker.
//! This crate is the single source of truth for store, schema and lifecycle invariants.

pub mod doctor;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod paths;
pub mod report;
pub mod rules;
pub mod service;
pub mod store;

pub use doctor::{BackupService, Doctor, DoctorError, DoctorReport, Health, Remedy};
pub use ledger::{CommitmentError, CommitmentResult, Ledger, LedgerRange};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::commitment::{CommitmentEntry, CommitmentStatus};
pub use model::settings::{Settings, SettingsError, SettingsKey};
pub use paths::StorePaths;
pub use report::MonthReport;
pub use rules::{FutureDatePolicy, LogWindow, RuleEngine, RuleViolation};
pub use service::clock::{Clock, FixedClock, SystemClock};
pub use service::commitment_service::CommitmentService;
pub use store::{LoadOutcome, Snapshot, Store, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
