use super::{now_iso, required, today};
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::metrics::{self, Window};
use crate::model::{Assignment, AssignmentStatus};
use crate::store::{PersistedCell, Store};
use crate::stores::classes::CLASSES;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

pub const ASSIGNMENTS: PersistedCell<Vec<Assignment>> =
    PersistedCell::new("school.assignments", Vec::new);

const DEFAULT_TOTAL: u32 = 25;
const NEW_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFilter {
    pub class_id: Option<i64>,
    pub status: Option<AssignmentStatus>,
    /// Matches title or description, case-insensitive.
    pub search: Option<String>,
}

impl AssignmentFilter {
    fn matches(&self, a: &Assignment) -> bool {
        let search = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self.class_id.map(|c| c == a.class_id).unwrap_or(true)
            && self.status.map(|s| s == a.status).unwrap_or(true)
            && search
                .map(|s| {
                    a.title.to_lowercase().contains(&s) || a.description.to_lowercase().contains(&s)
                })
                .unwrap_or(true)
    }
}

/// Newest first.
pub fn list(store: &mut Store, filter: &AssignmentFilter) -> Vec<Assignment> {
    let mut out: Vec<Assignment> = ASSIGNMENTS
        .get(store)
        .into_iter()
        .filter(|a| filter.matches(a))
        .collect();
    out.sort_by(|a, b| b.id.cmp(&a.id));
    out
}

fn require_class(store: &mut Store, class_id: i64) -> SchoolResult<()> {
    if CLASSES.get(store).iter().any(|c| c.id == class_id) {
        Ok(())
    } else {
        Err(SchoolError::MissingReference {
            ids: vec![class_id.to_string()],
        })
    }
}

fn due_date(raw: Option<&str>) -> SchoolResult<String> {
    match raw.map(str::trim).filter(|d| !d.is_empty()) {
        None => Ok(today().format("%Y-%m-%d").to_string()),
        Some(d) => metrics::parse_date(d)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .ok_or_else(|| SchoolError::validation("dueDate must be YYYY-MM-DD")),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub class_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub description: String,
}

pub fn create(store: &mut Store, input: NewAssignment) -> SchoolResult<Assignment> {
    let title = required(&input.title, "title")?;
    let due = due_date(input.due_date.as_deref())?;
    require_class(store, input.class_id)?;

    let assignment = ASSIGNMENTS.update(store, |rows| {
        let a = Assignment {
            id: ids::next_id(rows.iter().map(|a| a.id)),
            class_id: input.class_id,
            title,
            due_date: due,
            status: AssignmentStatus::Open,
            submissions: 0,
            total: input.total.unwrap_or(DEFAULT_TOTAL),
            description: input.description.trim().to_string(),
            created_at: now_iso(),
        };
        rows.push(a.clone());
        a
    });
    info!(id = assignment.id, class_id = assignment.class_id, "assignment created");
    Ok(assignment)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssignmentPatch {
    pub class_id: Option<i64>,
    pub title: Option<String>,
    pub due_date: Option<String>,
    pub total: Option<u32>,
    pub description: Option<String>,
}

/// Status, submissions and `createdAt` survive an edit. Lowering `total`
/// below the submission count pulls the count down with it.
pub fn update(store: &mut Store, id: i64, patch: AssignmentPatch) -> SchoolResult<Assignment> {
    if let Some(class_id) = patch.class_id {
        require_class(store, class_id)?;
    }
    let due = match patch.due_date.as_deref() {
        Some(raw) => Some(due_date(Some(raw))?),
        None => None,
    };
    let updated = ASSIGNMENTS.try_update(store, |rows| {
        let a = find_mut(rows, id)?;
        if let Some(v) = patch.title {
            a.title = required(&v, "title")?;
        }
        if let Some(v) = patch.class_id {
            a.class_id = v;
        }
        if let Some(v) = due {
            a.due_date = v;
        }
        if let Some(v) = patch.total {
            a.total = v;
            a.submissions = a.submissions.min(v);
        }
        if let Some(v) = patch.description {
            a.description = v.trim().to_string();
        }
        Ok::<_, SchoolError>(a.clone())
    })?;
    info!(id, "assignment updated");
    Ok(updated)
}

fn find_mut(rows: &mut [Assignment], id: i64) -> SchoolResult<&mut Assignment> {
    rows.iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| SchoolError::not_found("assignment", id))
}

pub fn toggle_status(store: &mut Store, id: i64) -> SchoolResult<Assignment> {
    let updated = ASSIGNMENTS.try_update(store, |rows| {
        let a = find_mut(rows, id)?;
        a.status = match a.status {
            AssignmentStatus::Open => AssignmentStatus::Closed,
            AssignmentStatus::Closed => AssignmentStatus::Open,
        };
        Ok::<_, SchoolError>(a.clone())
    })?;
    info!(id, status = ?updated.status, "assignment status toggled");
    Ok(updated)
}

/// Counts one more hand-in, capped at `total`.
pub fn add_submission(store: &mut Store, id: i64) -> SchoolResult<Assignment> {
    ASSIGNMENTS.try_update(store, |rows| {
        let a = find_mut(rows, id)?;
        a.submissions = a.submissions.saturating_add(1).min(a.total);
        Ok::<_, SchoolError>(a.clone())
    })
}

pub fn delete(store: &mut Store, id: i64) -> SchoolResult<Assignment> {
    let removed = ASSIGNMENTS.try_update(store, |rows| {
        let idx = rows
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| SchoolError::not_found("assignment", id))?;
        Ok::<_, SchoolError>(rows.remove(idx))
    })?;
    info!(id, "assignment deleted");
    Ok(removed)
}

/// Drops every assignment set for a class. Returns how many went.
pub(crate) fn forget_class(rows: &mut Vec<Assignment>, class_id: i64) -> usize {
    let before = rows.len();
    rows.retain(|a| a.class_id != class_id);
    before - rows.len()
}

pub fn open_count(rows: &[Assignment]) -> usize {
    rows.iter()
        .filter(|a| a.status == AssignmentStatus::Open)
        .count()
}

/// Created within the week up to `as_of`. Rows without a readable
/// `createdAt` never count.
pub fn created_this_week(rows: &[Assignment], as_of: NaiveDate) -> usize {
    let window = Window::trailing(as_of, NEW_WINDOW_DAYS);
    rows.iter()
        .filter_map(|a| metrics::parse_date(&a.created_at))
        .filter(|d| window.contains(*d))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::classes::{self, NewClass};
    use crate::stores::testutil::store;

    fn seeded() -> Store {
        let mut s = store();
        classes::create(
            &mut s,
            NewClass {
                grade: "Grade 9".into(),
                section: "A".into(),
                subject: "Mathematics".into(),
                ..Default::default()
            },
        )
        .expect("class");
        s
    }

    fn homework(title: &str, total: Option<u32>) -> NewAssignment {
        NewAssignment {
            class_id: 1,
            title: title.into(),
            due_date: Some("2026-03-20".into()),
            total,
            description: "Exercises 1-10".into(),
        }
    }

    #[test]
    fn create_defaults_and_validates() {
        let mut s = seeded();
        let a = create(&mut s, homework("Fractions", None)).expect("create");
        assert_eq!(a.status, AssignmentStatus::Open);
        assert_eq!((a.submissions, a.total), (0, 25));
        assert_eq!(a.due_date, "2026-03-20");

        let mut orphan = homework("Orphan", None);
        orphan.class_id = 9;
        assert_eq!(create(&mut s, orphan).unwrap_err().code(), "missing_reference");
        assert_eq!(
            create(&mut s, homework("  ", None)).unwrap_err().code(),
            "bad_params"
        );
        let mut undated = homework("Undated", None);
        undated.due_date = Some("next week".into());
        assert_eq!(create(&mut s, undated).unwrap_err().code(), "bad_params");
        assert_eq!(list(&mut s, &AssignmentFilter::default()).len(), 1);
    }

    #[test]
    fn submissions_stop_at_total() {
        let mut s = seeded();
        let a = create(&mut s, homework("Quiz", Some(2))).expect("create");
        for _ in 0..3 {
            add_submission(&mut s, a.id).expect("submit");
        }
        assert_eq!(add_submission(&mut s, a.id).expect("submit").submissions, 2);

        let shrunk = update(
            &mut s,
            a.id,
            AssignmentPatch {
                total: Some(1),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!((shrunk.submissions, shrunk.total), (1, 1));
        assert_eq!(shrunk.title, "Quiz");
    }

    #[test]
    fn toggle_and_counts() {
        let mut s = seeded();
        let a = create(&mut s, homework("Essay", None)).expect("a");
        create(&mut s, homework("Lab report", None)).expect("b");
        assert_eq!(toggle_status(&mut s, a.id).expect("close").status, AssignmentStatus::Closed);

        let rows = ASSIGNMENTS.get(&mut s);
        assert_eq!(open_count(&rows), 1);
        assert_eq!(created_this_week(&rows, today()), 2);
        let later = today() + chrono::Duration::days(30);
        assert_eq!(created_this_week(&rows, later), 0);

        let f = AssignmentFilter {
            search: Some("LAB".into()),
            ..Default::default()
        };
        assert_eq!(list(&mut s, &f)[0].title, "Lab report");
        let f = AssignmentFilter {
            status: Some(AssignmentStatus::Closed),
            ..Default::default()
        };
        assert_eq!(list(&mut s, &f).len(), 1);

        delete(&mut s, a.id).expect("delete");
        assert_eq!(toggle_status(&mut s, a.id).unwrap_err().code(), "not_found");
    }

    #[test]
    fn unknown_patch_fields_are_rejected() {
        let err = serde_json::from_value::<AssignmentPatch>(serde_json::json!({ "grade": "A" }));
        assert!(err.is_err());
    }
}
