//! Monthly completion statistics over the ledger.

use crate::ledger::{CommitmentError, CommitmentResult, Ledger};
use crate::model::commitment::CommitmentStatus;
use std::fmt::{Display, Formatter};

/// Per-month counts and completion rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthReport {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    /// Days that have a commitment, whatever its status.
    pub committed: u32,
    pub done: u32,
    pub skipped: u32,
    pub pending: u32,
}

impl MonthReport {
    pub fn build(ledger: &Ledger, year: i32, month: u32) -> CommitmentResult<Self> {
        let mut report = Self {
            year,
            month,
            days_in_month: 0,
            committed: 0,
            done: 0,
            skipped: 0,
            pending: 0,
        };

        for (_, entry) in ledger.month_days(year, month)? {
            report.days_in_month += 1;
            let Some(entry) = entry else {
                continue;
            };
            report.committed += 1;
            match entry.status {
                CommitmentStatus::Done => report.done += 1,
                CommitmentStatus::Skipped => report.skipped += 1,
                CommitmentStatus::Pending => report.pending += 1,
            }
        }
        Ok(report)
    }

    /// Done days over committed days; `0.0` when nothing was committed.
    pub fn completion_rate(&self) -> f64 {
        if self.committed == 0 {
            return 0.0;
        }
        f64::from(self.done) / f64::from(self.committed)
    }

    pub fn uncommitted(&self) -> u32 {
        self.days_in_month - self.committed
    }
}

impl Display for MonthReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{:02}: {}/{} days committed, {} done, {} skipped, {} pending ({:.0}% complete)",
            self.year,
            self.month,
            self.committed,
            self.days_in_month,
            self.done,
            self.skipped,
            self.pending,
            self.completion_rate() * 100.0
        )
    }
}

/// Parses a `YYYY-MM` month reference.
pub fn parse_month(value: &str) -> CommitmentResult<(i32, u32)> {
    let invalid = || CommitmentError::MalformedMonth(value.to_string());
    let (year, month) = value.trim().split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(CommitmentError::InvalidMonth { year, month });
    }
    Ok((year, month))
}

#[cfg(test)]
mod tests {
    use super::parse_month;
    use crate::ledger::CommitmentError;

    #[test]
    fn parse_month_accepts_canonical_form_only() {
        assert_eq!(parse_month("2024-02").unwrap(), (2024, 2));
        assert!(matches!(
            parse_month("2024-13"),
            Err(CommitmentError::InvalidMonth { month: 13, .. })
        ));
        assert!(parse_month("2024-2").is_err());
        let err = parse_month("Feb 2024").unwrap_err();
        assert!(matches!(&err, CommitmentError::MalformedMonth(raw) if raw == "Feb 2024"));
        assert!(err.to_string().contains("Feb 2024"));
    }
}
