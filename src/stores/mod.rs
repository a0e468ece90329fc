//! Persisted entity collections and the operations over them. Every
//! mutation reads the whole collection, changes it and writes it back.

pub mod assignments;
pub mod attendance;
pub mod classes;
pub mod dashboard;
pub mod documents;
pub mod events;
pub mod messages;
pub mod notifications;
pub mod parents;
pub mod payments;
pub mod profile;
pub mod results;
pub mod setup;
pub mod students;
pub mod teachers;

use crate::error::{SchoolError, SchoolResult};
use chrono::{NaiveDate, SecondsFormat, Utc};

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn required(value: &str, field: &str) -> SchoolResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(SchoolError::validation(format!("{} must not be empty", field)));
    }
    Ok(v.to_string())
}

fn trimmed_or(value: Option<&str>, fallback: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
