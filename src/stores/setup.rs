//! Persisted application settings, one store key per section. Saved values
//! are merged over the defaults field by field, so a section written by an
//! older build still picks up fields added since.

use crate::ids::RollPolicy;
use crate::store::Store;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupSection {
    Attendance,
    Fees,
    Results,
    Registration,
}

impl SetupSection {
    pub const ALL: [SetupSection; 4] = [
        SetupSection::Attendance,
        SetupSection::Fees,
        SetupSection::Results,
        SetupSection::Registration,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "attendance" => Some(Self::Attendance),
            "fees" => Some(Self::Fees),
            "results" => Some(Self::Results),
            "registration" => Some(Self::Registration),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Fees => "fees",
            Self::Results => "results",
            Self::Registration => "registration",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Attendance => "school.setup.attendance",
            Self::Fees => "school.setup.fees",
            Self::Results => "school.setup.results",
            Self::Registration => "school.setup.registration",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Attendance => json!({
            "absentMarker": "absent",
            "teacherWindowDays": 7,
            "parentWindowDays": 14
        }),
        SetupSection::Fees => json!({
            "resetPaidPercent": 50
        }),
        SetupSection::Results => json!({
            "passMark": 50
        }),
        SetupSection::Registration => json!({
            "rollPrefix": "2024",
            "rollCounterWidth": 3
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_token(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must be string", key))?
        .trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Map<String, Value>,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    for (k, v) in patch {
        let value = match (section, k.as_str()) {
            (SetupSection::Attendance, "absentMarker") => {
                Value::String(parse_token(v, k, 24)?.to_lowercase())
            }
            (SetupSection::Attendance, "teacherWindowDays" | "parentWindowDays") => {
                Value::from(parse_i64_range(v, k, 1, 365)?)
            }
            (SetupSection::Fees, "resetPaidPercent") => Value::from(parse_i64_range(v, k, 0, 100)?),
            (SetupSection::Results, "passMark") => Value::from(parse_i64_range(v, k, 0, 100)?),
            (SetupSection::Registration, "rollPrefix") => Value::String(parse_token(v, k, 12)?),
            (SetupSection::Registration, "rollCounterWidth") => {
                Value::from(parse_i64_range(v, k, 1, 9)?)
            }
            _ => return Err(format!("unknown {} field: {}", section.name(), k)),
        };
        current.insert(k.clone(), value);
    }
    Ok(())
}

pub fn load_section(store: &Store, section: SetupSection) -> Value {
    let mut current = match default_section(section) {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };
    if let Some(Value::Object(saved)) = store.peek(section.key()) {
        // Fields that no longer validate fall back to their defaults.
        for (k, v) in &saved {
            let mut one = Map::new();
            one.insert(k.clone(), v.clone());
            if let Err(msg) = merge_section_patch(section, &mut current, &one) {
                warn!(section = section.name(), "ignoring saved setup value: {}", msg);
            }
        }
    }
    Value::Object(current)
}

pub fn load_all(store: &Store) -> Value {
    let mut out = Map::new();
    for section in SetupSection::ALL {
        out.insert(section.name().to_string(), load_section(store, section));
    }
    Value::Object(out)
}

/// Validates the whole patch before writing anything.
pub fn update_section(
    store: &mut Store,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> Result<Value, String> {
    let mut current = match load_section(store, section) {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };
    merge_section_patch(section, &mut current, patch)?;
    let value = Value::Object(current);
    store.set(section.key(), &value);
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSettings {
    pub absent_marker: String,
    pub teacher_window_days: i64,
    pub parent_window_days: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSettings {
    pub reset_paid_percent: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSettings {
    pub pass_mark: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationSettings {
    roll_prefix: String,
    roll_counter_width: usize,
}

fn typed<T: DeserializeOwned + Default>(store: &Store, section: SetupSection) -> T {
    serde_json::from_value(load_section(store, section)).unwrap_or_default()
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            absent_marker: "absent".to_string(),
            teacher_window_days: 7,
            parent_window_days: 14,
        }
    }
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            reset_paid_percent: 50,
        }
    }
}

impl Default for ResultSettings {
    fn default() -> Self {
        Self { pass_mark: 50 }
    }
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        let policy = RollPolicy::default();
        Self {
            roll_prefix: policy.prefix,
            roll_counter_width: policy.counter_width,
        }
    }
}

pub fn attendance(store: &Store) -> AttendanceSettings {
    typed(store, SetupSection::Attendance)
}

pub fn fees(store: &Store) -> FeeSettings {
    typed(store, SetupSection::Fees)
}

pub fn results(store: &Store) -> ResultSettings {
    typed(store, SetupSection::Results)
}

pub fn roll_policy(store: &Store) -> RollPolicy {
    let r: RegistrationSettings = typed(store, SetupSection::Registration);
    RollPolicy {
        prefix: r.roll_prefix,
        counter_width: r.roll_counter_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> Store {
        Store::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn defaults_without_saved_values() {
        let mut s = store();
        assert_eq!(attendance(&mut s), AttendanceSettings::default());
        assert_eq!(fees(&mut s).reset_paid_percent, 50);
        assert_eq!(roll_policy(&mut s), RollPolicy::default());
        let all = load_all(&mut s);
        assert_eq!(all["results"]["passMark"], json!(50));
    }

    #[test]
    fn patch_is_validated_as_a_whole() {
        let mut s = store();
        let patch = json!({ "resetPaidPercent": 25, "bogus": 1 });
        let err = update_section(&mut s, SetupSection::Fees, patch.as_object().expect("obj"))
            .unwrap_err();
        assert!(err.contains("unknown fees field"));
        assert_eq!(fees(&mut s).reset_paid_percent, 50);

        let patch = json!({ "resetPaidPercent": 25 });
        update_section(&mut s, SetupSection::Fees, patch.as_object().expect("obj"))
            .expect("update");
        assert_eq!(fees(&mut s).reset_paid_percent, 25);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut s = store();
        let patch = json!({ "rollCounterWidth": 0 });
        assert!(update_section(&mut s, SetupSection::Registration, patch.as_object().expect("obj"))
            .is_err());
        let patch = json!({ "rollPrefix": "S25-", "rollCounterWidth": 4 });
        update_section(&mut s, SetupSection::Registration, patch.as_object().expect("obj"))
            .expect("update");
        assert_eq!(roll_policy(&mut s).format(7), "S25-0007");
    }

    #[test]
    fn malformed_saved_field_falls_back_to_default() {
        let mut s = store();
        s.set(
            "school.setup.attendance",
            &json!({ "absentMarker": "", "parentWindowDays": 21 }),
        );
        let a = attendance(&mut s);
        assert_eq!(a.absent_marker, "absent");
        assert_eq!(a.parent_window_days, 21);
    }
}
