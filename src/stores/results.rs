use super::setup;
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::metrics::{self, ResultsSummary};
use crate::model::{ResultRow, Student};
use crate::resolve::RollIndex;
use crate::store::{PersistedCell, Store};
use crate::stores::students::STUDENTS;
use serde::Deserialize;
use tracing::info;

pub const RESULTS: PersistedCell<Vec<ResultRow>> = PersistedCell::new("school.results", Vec::new);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFilter {
    pub class_grade: Option<String>,
    pub section: Option<String>,
    pub grade: Option<String>,
    pub search: Option<String>,
}

impl ResultFilter {
    fn matches(&self, r: &ResultRow) -> bool {
        let eq = |want: &Option<String>, have: &str| want.as_deref().map(|w| w == have).unwrap_or(true);
        let search = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        eq(&self.class_grade, &r.class_grade)
            && eq(&self.section, &r.section)
            && eq(&self.grade, &r.grade)
            && search
                .map(|s| r.name.to_lowercase().contains(&s) || r.roll_no.to_lowercase().contains(&s))
                .unwrap_or(true)
    }
}

pub fn list(store: &mut Store, filter: &ResultFilter) -> Vec<ResultRow> {
    RESULTS
        .get(store)
        .into_iter()
        .filter(|r| filter.matches(r))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInput {
    /// Present when editing an existing row.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub roll_no: Option<String>,
    #[serde(default)]
    pub math: f64,
    #[serde(default)]
    pub english: f64,
    #[serde(default)]
    pub science: f64,
    #[serde(default)]
    pub history: f64,
}

fn owning_student(students: &[Student], input: &ResultInput) -> SchoolResult<Student> {
    let id = match input.student_id {
        Some(id) => Some(id),
        None => input
            .roll_no
            .as_deref()
            .and_then(|roll| RollIndex::build(students).lookup(roll)),
    };
    id.and_then(|id| students.iter().find(|s| s.id == id))
        .cloned()
        .ok_or_else(|| SchoolError::validation("Select a registered student to record results."))
}

fn scored_row(id: i64, student: &Student, input: &ResultInput) -> ResultRow {
    let math = metrics::clamp_score(input.math);
    let english = metrics::clamp_score(input.english);
    let science = metrics::clamp_score(input.science);
    let history = metrics::clamp_score(input.history);
    let percentage = metrics::percentage(math, english, science, history);
    ResultRow {
        id,
        student_id: Some(student.id),
        roll_no: student.roll_number.clone(),
        name: student.name.clone(),
        class_grade: student.grade.clone(),
        section: student.section.clone(),
        math,
        english,
        science,
        history,
        total: math + english + science + history,
        percentage,
        grade: metrics::compute_grade(percentage).to_string(),
        remarks: metrics::remarks(percentage).to_string(),
    }
}

/// Creates a row, or replaces the one named by `input.id`.
pub fn save(store: &mut Store, input: ResultInput) -> SchoolResult<ResultRow> {
    let students = STUDENTS.get(store);
    let student = owning_student(&students, &input)?;

    let row = RESULTS.try_update(store, |rows| match input.id {
        Some(id) => {
            let slot = rows
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| SchoolError::not_found("result", id))?;
            *slot = scored_row(id, &student, &input);
            Ok(slot.clone())
        }
        None => {
            let row = scored_row(ids::next_id(rows.iter().map(|r| r.id)), &student, &input);
            rows.push(row.clone());
            Ok::<_, SchoolError>(row)
        }
    })?;
    info!(id = row.id, grade = %row.grade, "result saved");
    Ok(row)
}

pub fn delete(store: &mut Store, id: i64) -> SchoolResult<ResultRow> {
    let removed = RESULTS.try_update(store, |rows| {
        let idx = rows
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| SchoolError::not_found("result", id))?;
        Ok::<_, SchoolError>(rows.remove(idx))
    })?;
    info!(id, "result deleted");
    Ok(removed)
}

pub fn summary(store: &mut Store, filter: &ResultFilter) -> ResultsSummary {
    let pass_mark = setup::results(store).pass_mark as f64;
    let rows = list(store, filter);
    let refs: Vec<&ResultRow> = rows.iter().collect();
    metrics::results_summary(&refs, pass_mark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::students::{self, StudentRegistration};
    use crate::stores::testutil::store;

    fn seeded() -> Store {
        let mut s = store();
        for roll in ["2024001", "2024002"] {
            students::register(
                &mut s,
                StudentRegistration {
                    roll_number: Some(roll.into()),
                    ..Default::default()
                },
            )
            .expect("student");
        }
        s
    }

    fn scores(roll: &str, v: [f64; 4]) -> ResultInput {
        ResultInput {
            roll_no: Some(roll.into()),
            math: v[0],
            english: v[1],
            science: v[2],
            history: v[3],
            ..Default::default()
        }
    }

    #[test]
    fn save_scores_and_grades() {
        let mut s = seeded();
        let r = save(&mut s, scores("2024001", [95.0, 120.0, 88.0, 91.0])).expect("save");
        assert_eq!(r.english, 100.0);
        assert_eq!(r.percentage, 93.5);
        assert_eq!(r.grade, "A+");
        assert_eq!(r.remarks, "Excellent");
        assert_eq!(r.student_id, Some(1));

        let mut edit = scores("2024001", [50.0, 50.0, 50.0, 50.0]);
        edit.id = Some(r.id);
        let r = save(&mut s, edit).expect("edit");
        assert_eq!(r.grade, "D");
        assert_eq!(list(&mut s, &ResultFilter::default()).len(), 1);
    }

    #[test]
    fn unregistered_roll_is_rejected() {
        let mut s = seeded();
        let err = save(&mut s, scores("nope", [1.0; 4])).unwrap_err();
        assert_eq!(err.to_string(), "Select a registered student to record results.");
    }

    #[test]
    fn summary_uses_configured_pass_mark() {
        let mut s = seeded();
        save(&mut s, scores("2024001", [80.0; 4])).expect("a");
        save(&mut s, scores("2024002", [55.0; 4])).expect("b");
        let summary = summary(&mut s, &ResultFilter::default());
        assert_eq!(summary.pass_rate, 100.0);
        let counts: Vec<usize> = summary.distribution.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 1, 0, 0, 1]);
    }
}
