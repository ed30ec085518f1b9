//! Lenient raw view of the state file and its conversion to a typed snapshot.
//!
//! # Responsibility
//! - Parse state-file bytes without losing duplicate or malformed day records.
//! - Convert a deduplicated raw record into JSON for the schema registry.
//! - Convert a latest-layout raw record into a typed `Snapshot`, reporting
//!   every structural problem found.
//!
//! # Invariants
//! - `RawDays` preserves file order; a later duplicate is the later write.
//! - `into_snapshot` never guesses: anything it cannot convert exactly is an issue.

use crate::ledger::Ledger;
use crate::model::commitment::{parse_date, CommitmentEntry, CommitmentStatus};
use crate::model::settings::Settings;
use crate::store::schema::latest_version;
use crate::store::Snapshot;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Structural problem found in a state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreIssue {
    EmptyFile,
    Undecodable(String),
    UnsupportedVersion { found: u32, latest: u32 },
    OutdatedVersion { found: u32, latest: u32 },
    MigrationFailed(String),
    MissingDays,
    MissingSettings,
    InvalidSetting { key: String, value: String },
    DuplicateDate { date: String, occurrences: usize },
    InvalidDateKey(String),
    StatusCase { date: String, found: String },
    UnknownStatus { date: String, found: String },
    InvalidTimestamp {
        date: String,
        field: &'static str,
        value: String,
    },
    BlankTitle { date: String },
    TitleWhitespace { date: String },
    BlankNote { date: String },
    NoteWhitespace { date: String },
}

impl Display for StoreIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFile => write!(f, "state file is empty"),
            Self::Undecodable(reason) => write!(f, "state file is not valid JSON: {reason}"),
            Self::UnsupportedVersion { found, latest } => write!(
                f,
                "schema version {found} is not supported (latest known is {latest})"
            ),
            Self::OutdatedVersion { found, latest } => {
                write!(f, "schema version {found} is older than current version {latest}")
            }
            Self::MigrationFailed(reason) => write!(f, "schema migration failed: {reason}"),
            Self::MissingDays => write!(f, "`days` block is missing"),
            Self::MissingSettings => write!(f, "`settings` block is missing"),
            Self::InvalidSetting { key, value } => {
                write!(f, "setting `{key}` has invalid value `{value}`")
            }
            Self::DuplicateDate { date, occurrences } => write!(
                f,
                "date `{date}` appears {occurrences} times; the last write wins"
            ),
            Self::InvalidDateKey(date) => write!(f, "`{date}` is not a YYYY-MM-DD date"),
            Self::StatusCase { date, found } => {
                write!(f, "status `{found}` for `{date}` has non-canonical casing")
            }
            Self::UnknownStatus { date, found } => {
                write!(f, "status `{found}` for `{date}` is not pending|done|skipped")
            }
            Self::InvalidTimestamp { date, field, value } => {
                write!(f, "`{field}` for `{date}` is not a timestamp: `{value}`")
            }
            Self::BlankTitle { date } => write!(f, "commitment for `{date}` has an empty title"),
            Self::TitleWhitespace { date } => {
                write!(f, "title for `{date}` has trailing whitespace")
            }
            Self::BlankNote { date } => write!(f, "note for `{date}` is blank"),
            Self::NoteWhitespace { date } => {
                write!(f, "note for `{date}` has trailing whitespace")
            }
        }
    }
}

/// One day record exactly as stored; every field beyond the title is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDay {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_at: Option<String>,
}

/// Day records in file order, duplicates included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDays(pub Vec<(String, RawDay)>);

impl RawDays {
    /// Dates that occur more than once, with their occurrence counts.
    pub fn duplicates(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (date, _) in &self.0 {
            *counts.entry(date.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(date, count)| (date.to_string(), count))
            .collect()
    }

    /// Keeps only the last occurrence of every date, preserving relative order.
    pub fn dedup_keep_last(&mut self) {
        let mut last_index: BTreeMap<String, usize> = BTreeMap::new();
        for (index, (date, _)) in self.0.iter().enumerate() {
            last_index.insert(date.clone(), index);
        }
        let mut index = 0;
        self.0.retain(|(date, _)| {
            let keep = last_index.get(date) == Some(&index);
            index += 1;
            keep
        });
    }
}

impl<'de> Deserialize<'de> for RawDays {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DaysVisitor;

        impl<'de> Visitor<'de> for DaysVisitor {
            type Value = RawDays;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map from dates to day records")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut days = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, RawDay>()? {
                    days.push(entry);
                }
                Ok(RawDays(days))
            }
        }

        deserializer.deserialize_map(DaysVisitor)
    }
}

impl Serialize for RawDays {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (date, day) in &self.0 {
            map.serialize_entry(date, day)?;
        }
        map.end()
    }
}

/// Whole state file as stored, valid at any known layout version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<RawDays>,
}

impl RawStore {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Re-reads a record produced by the schema registry.
    pub fn from_record(record: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record)
    }

    /// Produces the JSON record handed to the schema registry.
    ///
    /// Duplicate dates collapse to their last occurrence.
    pub fn into_record(mut self) -> Result<Value, serde_json::Error> {
        if let Some(days) = self.days.as_mut() {
            days.dedup_keep_last();
        }
        serde_json::to_value(self)
    }

    /// Converts a latest-layout record into a typed snapshot.
    ///
    /// Returns every issue found when the record cannot be converted exactly.
    pub fn into_snapshot(self) -> Result<Snapshot, Vec<StoreIssue>> {
        let mut issues = Vec::new();

        let settings = match self.settings {
            None => Settings::default(),
            Some(map) => match serde_json::from_value::<Settings>(Value::Object(map)) {
                Ok(settings) => {
                    if let Err(err) = settings.validate() {
                        issues.push(StoreIssue::InvalidSetting {
                            key: "settings".to_string(),
                            value: err.to_string(),
                        });
                    }
                    settings
                }
                Err(err) => {
                    issues.push(StoreIssue::InvalidSetting {
                        key: "settings".to_string(),
                        value: err.to_string(),
                    });
                    Settings::default()
                }
            },
        };

        let Some(days) = self.days else {
            issues.push(StoreIssue::MissingDays);
            return Err(issues);
        };

        let mut ledger = Ledger::default();
        for (key, day) in days.0 {
            match convert_day(&key, day) {
                Ok(entry) => {
                    if ledger.insert(entry).is_some() {
                        issues.push(StoreIssue::DuplicateDate {
                            date: key,
                            occurrences: 2,
                        });
                    }
                }
                Err(mut day_issues) => issues.append(&mut day_issues),
            }
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        Ok(Snapshot {
            schema_version: latest_version(),
            timezone: self.timezone,
            settings,
            ledger,
        })
    }
}

fn convert_day(key: &str, day: RawDay) -> Result<CommitmentEntry, Vec<StoreIssue>> {
    let mut issues = Vec::new();

    let date = parse_date(key);
    if date.is_none() {
        issues.push(StoreIssue::InvalidDateKey(key.to_string()));
    }

    let status = match day.status.as_deref() {
        None => Some(CommitmentStatus::Pending),
        Some(value) => {
            let status = CommitmentStatus::parse(value);
            if status.is_none() {
                issues.push(StoreIssue::UnknownStatus {
                    date: key.to_string(),
                    found: value.to_string(),
                });
            }
            status
        }
    };

    let mut timestamp = |field: &'static str, value: Option<String>| match value {
        None => None,
        Some(value) => {
            let parsed = parse_timestamp(&value);
            if parsed.is_none() {
                issues.push(StoreIssue::InvalidTimestamp {
                    date: key.to_string(),
                    field,
                    value,
                });
            }
            parsed
        }
    };
    let created_at = timestamp("created_at", day.created_at);
    let completed_at = timestamp("completed_at", day.completed_at);
    let skipped_at = timestamp("skipped_at", day.skipped_at);

    match (date, status) {
        (Some(date), Some(status)) if issues.is_empty() => Ok(CommitmentEntry {
            date,
            title: day.title,
            status,
            note: day.note,
            created_at,
            completed_at,
            skipped_at,
        }),
        _ => Err(issues),
    }
}

/// Parses RFC 3339 timestamps, and offset-less timestamps written by early
/// releases, which are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    value
        .parse::<NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc())
}
