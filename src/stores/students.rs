use super::{now_iso, profile, setup, trimmed_or};
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::model::{RecordStatus, Student};
use crate::resolve;
use crate::store::{PersistedCell, Store};
use crate::stores::parents::{self, PARENTS};
use crate::stores::payments::PAYMENTS;
use crate::stores::results::RESULTS;
use serde::Deserialize;
use tracing::info;

pub const STUDENTS: PersistedCell<Vec<Student>> = PersistedCell::new("school.students", Vec::new);

pub fn list(store: &mut Store, school_id: Option<&str>) -> Vec<Student> {
    let all = STUDENTS.get(store);
    resolve::scoped(&all, school_id).into_iter().cloned().collect()
}

pub fn get(store: &mut Store, id: i64) -> SchoolResult<Student> {
    STUDENTS
        .get(store)
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| SchoolError::not_found("student", id))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRegistration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

pub fn register(store: &mut Store, input: StudentRegistration) -> SchoolResult<Student> {
    if (input.password.is_some() || input.confirm_password.is_some())
        && input.password != input.confirm_password
    {
        return Err(SchoolError::validation("Passwords do not match."));
    }
    let school_id = profile::resolve_school_id(store, input.school_id.as_deref())?;
    let policy = setup::roll_policy(store);

    let student = STUDENTS.try_update(store, |students| {
        let id = ids::next_id(students.iter().map(|s| s.id));
        let roll_number = ids::allocate_roll_number(
            students.iter().map(|s| s.roll_number.as_str()),
            input.roll_number.as_deref(),
            id,
            &policy,
        )?;
        let student = Student {
            id,
            student_id: ids::student_code(id),
            roll_number,
            name: trimmed_or(input.name.as_deref(), "Student"),
            grade: trimmed_or(input.grade.as_deref(), "Grade 9"),
            section: trimmed_or(input.section.as_deref(), "A"),
            contact: trimmed_or(input.contact.as_deref(), "N/A"),
            email: input.email.as_deref().unwrap_or_default().trim().to_string(),
            status: RecordStatus::Active,
            school_id,
            created_at: Some(now_iso()),
        };
        students.push(student.clone());
        Ok::<_, SchoolError>(student)
    })?;
    info!(id = student.id, roll = %student.roll_number, "student registered");
    Ok(student)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub roll_number: Option<String>,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub status: Option<RecordStatus>,
}

/// Edits a student. A changed name or roll number is carried into the
/// payments and results that belong to the student.
pub fn update(store: &mut Store, id: i64, patch: StudentPatch) -> SchoolResult<Student> {
    let policy = setup::roll_policy(store);
    let (before, after) = STUDENTS.try_update(store, |students| {
        let idx = students
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SchoolError::not_found("student", id))?;
        let before = students[idx].clone();
        let mut s = before.clone();

        if let Some(raw) = patch.roll_number.as_deref() {
            let raw = raw.trim();
            if !raw.is_empty() && !raw.eq_ignore_ascii_case(&before.roll_number) {
                s.roll_number = ids::allocate_roll_number(
                    students
                        .iter()
                        .filter(|o| o.id != id)
                        .map(|o| o.roll_number.as_str()),
                    Some(raw),
                    id,
                    &policy,
                )?;
            } else if !raw.is_empty() {
                s.roll_number = raw.to_string();
            }
        }
        if let Some(v) = patch.name {
            s.name = super::required(&v, "name")?;
        }
        if let Some(v) = patch.grade {
            s.grade = super::required(&v, "grade")?;
        }
        if let Some(v) = patch.section {
            s.section = super::required(&v, "section")?;
        }
        if let Some(v) = patch.contact {
            s.contact = v.trim().to_string();
        }
        if let Some(v) = patch.email {
            s.email = v.trim().to_string();
        }
        if let Some(v) = patch.status {
            s.status = v;
        }
        students[idx] = s.clone();
        Ok::<_, SchoolError>((before, s))
    })?;

    if before.roll_number != after.roll_number || before.name != after.name {
        cascade_identity(store, &before, &after);
    }
    info!(id, "student updated");
    Ok(after)
}

fn cascade_identity(store: &mut Store, before: &Student, after: &Student) {
    let payments = PAYMENTS.update(store, |rows| {
        let mut n = 0;
        for p in rows.iter_mut().filter(|p| resolve::owned_by(&**p, before)) {
            p.student_id = Some(after.id);
            p.roll_no = after.roll_number.clone();
            p.student = after.name.clone();
            n += 1;
        }
        n
    });
    let results = RESULTS.update(store, |rows| {
        let mut n = 0;
        for r in rows.iter_mut().filter(|r| resolve::owned_by(&**r, before)) {
            r.student_id = Some(after.id);
            r.roll_no = after.roll_number.clone();
            r.name = after.name.clone();
            n += 1;
        }
        n
    });
    info!(id = after.id, payments, results, "student identity carried into related records");
}

/// Removes the student together with everything keyed to it. Parent links
/// and `children` entries are stripped, and the student's payments and
/// results are deleted, so a later registration that reuses the id or roll
/// number starts clean.
pub fn delete(store: &mut Store, id: i64) -> SchoolResult<Student> {
    let removed = STUDENTS.try_update(store, |students| {
        let idx = students
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SchoolError::not_found("student", id))?;
        Ok::<_, SchoolError>(students.remove(idx))
    })?;

    let parents = PARENTS.update(store, |rows| parents::forget_student(rows, &removed));
    let payments = PAYMENTS.update(store, |rows| {
        let before = rows.len();
        rows.retain(|p| !resolve::owned_by(p, &removed));
        before - rows.len()
    });
    let results = RESULTS.update(store, |rows| {
        let before = rows.len();
        rows.retain(|r| !resolve::owned_by(r, &removed));
        before - rows.len()
    });
    info!(id, parents, payments, results, "student deleted");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::testutil::store;

    fn reg(name: &str, roll: Option<&str>) -> StudentRegistration {
        StudentRegistration {
            name: Some(name.into()),
            roll_number: roll.map(str::to_string),
            grade: Some("Grade 9".into()),
            section: Some("A".into()),
            ..Default::default()
        }
    }

    #[test]
    fn register_allocates_codes_and_rolls() {
        let mut s = store();
        let a = register(&mut s, reg("Ada", None)).expect("first");
        assert_eq!((a.id, a.student_id.as_str(), a.roll_number.as_str()), (1, "STD-0001", "2024001"));
        let b = register(&mut s, reg("Ben", Some("custom-7"))).expect("second");
        assert_eq!(b.roll_number, "custom-7");
        assert_eq!(b.contact, "N/A");
    }

    #[test]
    fn duplicate_roll_aborts_without_write() {
        let mut s = store();
        register(&mut s, reg("Ada", Some("2024001"))).expect("first");
        let before = s.peek("school.students");
        let err = register(&mut s, reg("Eve", Some("2024001"))).unwrap_err();
        assert_eq!(err.to_string(), "That roll number is already registered.");
        assert_eq!(s.peek("school.students"), before);
    }

    #[test]
    fn password_mismatch_is_rejected() {
        let mut s = store();
        let mut input = reg("Ada", None);
        input.password = Some("a".into());
        input.confirm_password = Some("b".into());
        assert_eq!(
            register(&mut s, input).unwrap_err().to_string(),
            "Passwords do not match."
        );
        assert!(list(&mut s, None).is_empty());
    }

    #[test]
    fn update_rechecks_roll_excluding_self() {
        let mut s = store();
        register(&mut s, reg("Ada", Some("R1"))).expect("a");
        register(&mut s, reg("Ben", Some("R2"))).expect("b");
        let same = update(
            &mut s,
            1,
            StudentPatch {
                roll_number: Some("r1".into()),
                ..Default::default()
            },
        )
        .expect("own roll");
        assert_eq!(same.roll_number, "r1");
        let err = update(
            &mut s,
            1,
            StudentPatch {
                roll_number: Some("R2".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "duplicate");
    }

    #[test]
    fn delete_removes_owned_payments_and_results() {
        use crate::stores::payments::{self, NewPayment};
        use crate::stores::results::{self, ResultInput};

        let mut s = store();
        register(&mut s, reg("Ada", None)).expect("a");
        register(&mut s, reg("Ben", None)).expect("b");
        let as_of = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).expect("date");
        for student_id in [1, 2] {
            payments::create(
                &mut s,
                NewPayment {
                    student_id: Some(student_id),
                    total_fees: 100.0,
                    ..Default::default()
                },
                as_of,
            )
            .expect("payment");
        }
        results::save(
            &mut s,
            ResultInput {
                student_id: Some(2),
                math: 80.0,
                ..Default::default()
            },
        )
        .expect("result");
        // A roll-only row written before numeric ids existed.
        PAYMENTS.update(&mut s, |rows| {
            let mut legacy = rows[1].clone();
            legacy.id = 3;
            legacy.student_id = None;
            rows.push(legacy);
        });

        delete(&mut s, 2).expect("delete");
        let left: Vec<Option<i64>> = PAYMENTS.get(&mut s).iter().map(|p| p.student_id).collect();
        assert_eq!(left, vec![Some(1)]);
        assert!(RESULTS.get(&mut s).is_empty());

        let stranger = register(&mut s, reg("Stranger", None)).expect("reuse");
        assert_eq!((stranger.id, stranger.roll_number.as_str()), (2, "2024002"));
        let owed = PAYMENTS
            .get(&mut s)
            .iter()
            .filter(|p| resolve::owned_by(*p, &stranger))
            .count();
        assert_eq!(owed, 0);
    }

    #[test]
    fn update_rewrites_roll_only_rows_and_stamps_the_id() {
        use crate::stores::payments::{self, NewPayment};

        let mut s = store();
        register(&mut s, reg("Ada", Some("R1"))).expect("a");
        let as_of = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).expect("date");
        payments::create(
            &mut s,
            NewPayment {
                student_id: Some(1),
                total_fees: 100.0,
                ..Default::default()
            },
            as_of,
        )
        .expect("payment");
        PAYMENTS.update(&mut s, |rows| {
            rows[0].student_id = None;
            rows[0].roll_no = "r1".into();
        });

        update(
            &mut s,
            1,
            StudentPatch {
                name: Some("Ada Owusu".into()),
                roll_number: Some("R9".into()),
                ..Default::default()
            },
        )
        .expect("update");
        let rows = PAYMENTS.get(&mut s);
        let row = &rows[0];
        assert_eq!(row.student_id, Some(1));
        assert_eq!(row.roll_no, "R9");
        assert_eq!(row.student, "Ada Owusu");
    }

    #[test]
    fn delete_unknown_student_is_not_found() {
        let mut s = store();
        assert_eq!(delete(&mut s, 3).unwrap_err().code(), "not_found");
    }
}
