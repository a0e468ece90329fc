use super::{required, setup};
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::metrics::{self, Trend, Window};
use crate::model::{AttendanceRecord, Student, TeacherClass};
use crate::store::{PersistedCell, Store};
use crate::stores::classes::CLASSES;
use crate::stores::students::STUDENTS;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

pub const ATTENDANCE: PersistedCell<Vec<AttendanceRecord>> =
    PersistedCell::new("school.attendance", Vec::new);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollCall {
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub attendance: BTreeMap<i64, String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Stores a roll call, replacing any earlier one for the same date, grade
/// and section. Counts are derived from the per-student statuses.
pub fn record(store: &mut Store, input: RollCall) -> SchoolResult<AttendanceRecord> {
    let date = metrics::parse_date(&input.date_iso)
        .ok_or_else(|| SchoolError::validation("dateISO must be YYYY-MM-DD"))?;
    let date_iso = date.format("%Y-%m-%d").to_string();
    let grade = required(&input.grade, "grade")?;
    let section = required(&input.section, "section")?;
    let marker = setup::attendance(store).absent_marker;

    let attendance: BTreeMap<i64, String> = input
        .attendance
        .into_iter()
        .map(|(id, status)| (id, status.trim().to_lowercase()))
        .filter(|(_, status)| !status.is_empty())
        .collect();
    let absent = attendance.values().filter(|s| **s == marker).count() as u32;
    let present = attendance.len() as u32 - absent;
    let note = input.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

    let saved = ATTENDANCE.update(store, |records| {
        let existing = records
            .iter_mut()
            .find(|r| r.date_iso == date_iso && r.grade == grade && r.section == section);
        match existing {
            Some(r) => {
                r.attendance = attendance;
                r.present = present;
                r.absent = absent;
                r.note = note;
                r.clone()
            }
            None => {
                let r = AttendanceRecord {
                    id: ids::next_id(records.iter().map(|r| r.id)),
                    date_iso,
                    grade,
                    section,
                    present,
                    absent,
                    attendance,
                    note,
                };
                records.push(r.clone());
                r
            }
        }
    });
    info!(id = saved.id, date = %saved.date_iso, present, absent, "attendance recorded");
    Ok(saved)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub grade: Option<String>,
    pub section: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Records for the query, newest date first.
pub fn list(store: &mut Store, query: &AttendanceQuery) -> Vec<AttendanceRecord> {
    let from = query.from.as_deref().and_then(metrics::parse_date);
    let to = query.to.as_deref().and_then(metrics::parse_date);
    let mut out: Vec<AttendanceRecord> = ATTENDANCE
        .get(store)
        .into_iter()
        .filter(|r| query.grade.as_deref().map(|g| g == r.grade).unwrap_or(true))
        .filter(|r| query.section.as_deref().map(|s| s == r.section).unwrap_or(true))
        .filter(|r| {
            let date = metrics::parse_date(&r.date_iso);
            from.map(|f| date.map(|d| d >= f).unwrap_or(false)).unwrap_or(true)
                && to.map(|t| date.map(|d| d <= t).unwrap_or(false)).unwrap_or(true)
        })
        .collect();
    out.sort_by(|a, b| b.date_iso.cmp(&a.date_iso));
    out
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuery {
    /// Per-student rate over these students.
    #[serde(default)]
    pub student_ids: Option<Vec<i64>>,
    /// Per-class rate over these classes; all classes when both are absent.
    #[serde(default)]
    pub class_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub days: Option<i64>,
}

pub fn student_trend(
    records: &[AttendanceRecord],
    students: &[Student],
    as_of: NaiveDate,
    days: i64,
    marker: &str,
) -> Trend {
    Trend::new(
        metrics::student_attendance_rate(records, students, Window::trailing(as_of, days), marker),
        metrics::student_attendance_rate(records, students, Window::previous(as_of, days), marker),
    )
}

pub fn class_trend(
    records: &[AttendanceRecord],
    classes: &[TeacherClass],
    as_of: NaiveDate,
    days: i64,
    marker: &str,
) -> Trend {
    Trend::new(
        metrics::class_attendance_rate(records, classes, Window::trailing(as_of, days), marker),
        metrics::class_attendance_rate(records, classes, Window::previous(as_of, days), marker),
    )
}

pub fn rate(store: &mut Store, query: &RateQuery, as_of: NaiveDate) -> SchoolResult<Trend> {
    if query.days.map(|d| d <= 0).unwrap_or(false) {
        return Err(SchoolError::validation("days must be positive"));
    }
    let settings = setup::attendance(store);
    let records = ATTENDANCE.get(store);
    if let Some(ids) = &query.student_ids {
        let days = query.days.unwrap_or(settings.parent_window_days);
        let students: Vec<Student> = STUDENTS
            .get(store)
            .into_iter()
            .filter(|s| ids.contains(&s.id))
            .collect();
        return Ok(student_trend(&records, &students, as_of, days, &settings.absent_marker));
    }
    let days = query.days.unwrap_or(settings.teacher_window_days);
    let mut classes = CLASSES.get(store);
    if let Some(ids) = &query.class_ids {
        classes.retain(|c| ids.contains(&c.id));
    }
    Ok(class_trend(&records, &classes, as_of, days, &settings.absent_marker))
}
