//! Plain-text doctor report.

use super::{DoctorReport, RepairOutcome, Severity};
use crate::store::schema::latest_version;
use std::fmt::Write;

impl DoctorReport {
    /// Renders the report as plain text, one fact per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "state file: {}", self.state_path.display())?;
        match self.detected_version {
            Some(version) => writeln!(
                out,
                "schema version: {version} (latest {})",
                latest_version()
            )?,
            None => writeln!(out, "schema version: unknown")?,
        }
        writeln!(out, "health: {}", self.health)?;

        let fixed_label = match self.outcome {
            RepairOutcome::Repaired { .. } => "fixed",
            _ => "fixable",
        };
        let sections = [
            (fixed_label, Severity::Fixable),
            ("unresolved", Severity::Unfixable),
            ("notes", Severity::Advisory),
        ];
        for (label, severity) in sections {
            let mut findings = self.findings_with(severity).peekable();
            if findings.peek().is_none() {
                continue;
            }
            writeln!(out, "{label}:")?;
            for finding in findings {
                writeln!(out, "  - {}", finding.issue)?;
            }
        }

        match &self.outcome {
            RepairOutcome::Repaired { backup } => {
                writeln!(out, "backup: {}", backup.display())?;
                writeln!(out, "repair: applied")?;
            }
            RepairOutcome::Initialized => writeln!(out, "repair: initialized a new state file")?,
            RepairOutcome::NotAttempted => {}
        }
        writeln!(out, "remedy: {}", self.remedy())?;
        writeln!(out, "exit code: {}", self.exit_code())
    }
}
