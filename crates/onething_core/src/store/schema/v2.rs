//! Layout version 2: per-day `note` field and top-level `settings` block.

use crate::model::settings::Settings;
use serde_json::{Map, Value};

const DAYS_FIELD: &str = "days";
const SETTINGS_FIELD: &str = "settings";
const NOTE_FIELD: &str = "note";

/// Adds `note: null` to every day and a settings block holding defaults.
///
/// Settings keys already present in the record win over defaults.
pub(super) fn upgrade_from_v1(record: &mut Map<String, Value>) -> Result<(), String> {
    match record.get_mut(DAYS_FIELD) {
        Some(Value::Object(days)) => {
            for (date, day) in days.iter_mut() {
                let day = day
                    .as_object_mut()
                    .ok_or_else(|| format!("day `{date}` is not an object"))?;
                day.entry(NOTE_FIELD).or_insert(Value::Null);
            }
        }
        Some(_) => return Err("`days` is not an object".to_string()),
        None => {
            record.insert(DAYS_FIELD.to_string(), Value::Object(Map::new()));
        }
    }

    let defaults = match serde_json::to_value(Settings::default()) {
        Ok(Value::Object(defaults)) => defaults,
        Ok(_) => return Err("default settings did not serialize to an object".to_string()),
        Err(err) => return Err(format!("failed to serialize default settings: {err}")),
    };

    match record
        .entry(SETTINGS_FIELD)
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(settings) => {
            let has_legacy_prompt = settings.contains_key("auto_prompt_on_empty");
            for (key, value) in defaults {
                if key == "prompt_on_empty" && has_legacy_prompt {
                    continue;
                }
                settings.entry(key).or_insert(value);
            }
            Ok(())
        }
        _ => Err("`settings` is not an object".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::upgrade_from_v1;
    use serde_json::{json, Value};

    fn upgrade(value: Value) -> Value {
        let mut object = value.as_object().cloned().unwrap();
        upgrade_from_v1(&mut object).unwrap();
        Value::Object(object)
    }

    #[test]
    fn adds_note_and_default_settings() {
        let upgraded = upgrade(json!({
            "version": 1,
            "days": {"2024-01-01": {"title": "Run 5k", "status": "pending"}}
        }));

        assert_eq!(upgraded["days"]["2024-01-01"]["note"], Value::Null);
        assert_eq!(upgraded["settings"]["prompt_on_empty"], json!(true));
        assert_eq!(upgraded["settings"]["strict_mode"], json!(false));
        assert_eq!(upgraded["settings"]["default_log_days"], json!(7));
    }

    #[test]
    fn keeps_existing_notes_and_settings() {
        let upgraded = upgrade(json!({
            "days": {"2024-01-01": {"title": "Read", "note": "chapter 3"}},
            "settings": {"strict_mode": true, "auto_prompt_on_empty": false}
        }));

        assert_eq!(upgraded["days"]["2024-01-01"]["note"], json!("chapter 3"));
        assert_eq!(upgraded["settings"]["strict_mode"], json!(true));
        assert_eq!(upgraded["settings"]["auto_prompt_on_empty"], json!(false));
        assert!(upgraded["settings"].get("prompt_on_empty").is_none());
    }

    #[test]
    fn upgrading_twice_is_stable() {
        let once = upgrade(json!({"days": {"2024-01-01": {"title": "Read"}}}));
        let twice = upgrade(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_non_object_days() {
        let mut object = json!({"days": []}).as_object().cloned().unwrap();
        assert!(upgrade_from_v1(&mut object).is_err());
    }
}
