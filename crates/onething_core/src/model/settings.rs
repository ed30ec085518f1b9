//! Global behavior switches persisted inside the store.
//!
//! # Responsibility
//! - Hold `prompt_on_empty`, `default_log_days`, `strict_mode` and backup retention.
//! - Parse and apply key-based configuration changes.
//!
//! # Invariants
//! - `default_log_days` and `max_backup_files` are always positive.
//! - Settings are never removed, only reset to `Settings::default()`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const DEFAULT_LOG_DAYS: u32 = 7;
pub const DEFAULT_MAX_BACKUP_FILES: u32 = 5;

/// Persisted behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Files written by earlier releases use `auto_prompt_on_empty`.
    #[serde(alias = "auto_prompt_on_empty")]
    pub prompt_on_empty: bool,
    /// Size of the recent log window, in days.
    pub default_log_days: u32,
    /// Locks finalized entries and forbids future-dated commitments.
    pub strict_mode: bool,
    /// Number of doctor backups kept on disk.
    pub max_backup_files: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prompt_on_empty: true,
            default_log_days: DEFAULT_LOG_DAYS,
            strict_mode: false,
            max_backup_files: DEFAULT_MAX_BACKUP_FILES,
        }
    }
}

/// Addressable setting names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    PromptOnEmpty,
    DefaultLogDays,
    StrictMode,
    MaxBackupFiles,
}

impl SettingsKey {
    pub const ALL: [SettingsKey; 4] = [
        Self::PromptOnEmpty,
        Self::DefaultLogDays,
        Self::StrictMode,
        Self::MaxBackupFiles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PromptOnEmpty => "prompt_on_empty",
            Self::DefaultLogDays => "default_log_days",
            Self::StrictMode => "strict_mode",
            Self::MaxBackupFiles => "max_backup_files",
        }
    }
}

impl Display for SettingsKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingsKey {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized == "auto_prompt_on_empty" {
            return Ok(Self::PromptOnEmpty);
        }
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or(SettingsError::UnknownKey(normalized))
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    UnknownKey(String),
    InvalidValue {
        key: SettingsKey,
        value: String,
        expected: &'static str,
    },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKey(key) => write!(
                f,
                "unknown setting `{key}`; expected prompt_on_empty|default_log_days|strict_mode|max_backup_files"
            ),
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "invalid value `{value}` for `{key}`: expected {expected}"),
        }
    }
}

impl Error for SettingsError {}

impl Settings {
    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.default_log_days == 0 {
            return Err(positive_error(SettingsKey::DefaultLogDays, "0"));
        }
        if self.max_backup_files == 0 {
            return Err(positive_error(SettingsKey::MaxBackupFiles, "0"));
        }
        Ok(())
    }

    /// Returns the current value of `key` rendered as text.
    pub fn get(&self, key: SettingsKey) -> String {
        match key {
            SettingsKey::PromptOnEmpty => self.prompt_on_empty.to_string(),
            SettingsKey::DefaultLogDays => self.default_log_days.to_string(),
            SettingsKey::StrictMode => self.strict_mode.to_string(),
            SettingsKey::MaxBackupFiles => self.max_backup_files.to_string(),
        }
    }

    /// Parses `raw` for `key` and applies it. Leaves `self` unchanged on error.
    pub fn apply(&mut self, key: SettingsKey, raw: &str) -> Result<(), SettingsError> {
        match key {
            SettingsKey::PromptOnEmpty => self.prompt_on_empty = parse_bool(key, raw)?,
            SettingsKey::StrictMode => self.strict_mode = parse_bool(key, raw)?,
            SettingsKey::DefaultLogDays => self.default_log_days = parse_positive(key, raw)?,
            SettingsKey::MaxBackupFiles => self.max_backup_files = parse_positive(key, raw)?,
        }
        Ok(())
    }

    /// Resets a single key to its documented default.
    pub fn reset(&mut self, key: SettingsKey) {
        let defaults = Self::default();
        match key {
            SettingsKey::PromptOnEmpty => self.prompt_on_empty = defaults.prompt_on_empty,
            SettingsKey::DefaultLogDays => self.default_log_days = defaults.default_log_days,
            SettingsKey::StrictMode => self.strict_mode = defaults.strict_mode,
            SettingsKey::MaxBackupFiles => self.max_backup_files = defaults.max_backup_files,
        }
    }
}

fn parse_bool(key: SettingsKey, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            key,
            value: raw.to_string(),
            expected: "true|false",
        }),
    }
}

fn parse_positive(key: SettingsKey, raw: &str) -> Result<u32, SettingsError> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(positive_error(key, raw)),
    }
}

fn positive_error(key: SettingsKey, value: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key,
        value: value.to_string(),
        expected: "a positive integer",
    }
}

#[cfg(test)]
mod tests {
    use super::{Settings, SettingsError, SettingsKey};

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert!(settings.prompt_on_empty);
        assert!(!settings.strict_mode);
        assert_eq!(settings.default_log_days, 7);
        assert_eq!(settings.max_backup_files, 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn apply_parses_and_validates_values() {
        let mut settings = Settings::default();
        settings.apply(SettingsKey::StrictMode, "yes").unwrap();
        settings.apply(SettingsKey::DefaultLogDays, " 30 ").unwrap();
        assert!(settings.strict_mode);
        assert_eq!(settings.default_log_days, 30);

        let err = settings
            .apply(SettingsKey::DefaultLogDays, "0")
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
        assert_eq!(settings.default_log_days, 30);
    }

    #[test]
    fn key_parsing_accepts_legacy_alias() {
        assert_eq!(
            "auto_prompt_on_empty".parse::<SettingsKey>().unwrap(),
            SettingsKey::PromptOnEmpty
        );
        assert!("colour".parse::<SettingsKey>().is_err());
    }

    #[test]
    fn legacy_field_name_deserializes() {
        let settings: Settings =
            serde_json::from_str(r#"{"auto_prompt_on_empty": false, "strict_mode": true}"#)
                .unwrap();
        assert!(!settings.prompt_on_empty);
        assert!(settings.strict_mode);
        assert_eq!(settings.default_log_days, 7);
    }
}
