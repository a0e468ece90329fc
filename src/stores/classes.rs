use super::{now_iso, required};
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::model::{Student, TeacherClass};
use crate::resolve;
use crate::store::{PersistedCell, Store};
use crate::stores::assignments::{self, ASSIGNMENTS};
use crate::stores::students::STUDENTS;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const CLASSES: PersistedCell<Vec<TeacherClass>> =
    PersistedCell::new("school.classes", Vec::new);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    #[serde(flatten)]
    pub class: TeacherClass,
    pub roster_count: usize,
}

pub fn list(store: &mut Store) -> Vec<ClassSummary> {
    let classes = CLASSES.get(store);
    let students = STUDENTS.get(store);
    classes
        .into_iter()
        .map(|class| ClassSummary {
            roster_count: resolve::roster_count(&students, &class),
            class,
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub grade: String,
    pub section: String,
    pub subject: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub schedule: String,
}

fn same_tuple(a: &TeacherClass, grade: &str, section: &str, subject: &str) -> bool {
    a.grade.eq_ignore_ascii_case(grade)
        && a.section.eq_ignore_ascii_case(section)
        && a.subject.eq_ignore_ascii_case(subject)
}

pub fn create(store: &mut Store, input: NewClass) -> SchoolResult<TeacherClass> {
    let grade = required(&input.grade, "grade")?;
    let section = required(&input.section, "section")?;
    let subject = required(&input.subject, "subject")?;

    let class = CLASSES.try_update(store, |classes| {
        if classes
            .iter()
            .any(|c| same_tuple(c, &grade, &section, &subject))
        {
            return Err(SchoolError::Duplicate {
                field: "class",
                value: format!("{} {} {}", grade, section, subject),
            });
        }
        let class = TeacherClass {
            id: ids::next_id(classes.iter().map(|c| c.id)),
            grade,
            section,
            subject,
            room: input.room.trim().to_string(),
            schedule: input.schedule.trim().to_string(),
            created_at: Some(now_iso()),
        };
        classes.push(class.clone());
        Ok(class)
    })?;
    info!(id = class.id, "class created");
    Ok(class)
}

pub fn delete(store: &mut Store, id: i64) -> SchoolResult<TeacherClass> {
    let removed = CLASSES.try_update(store, |classes| {
        let idx = classes
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| SchoolError::not_found("class", id))?;
        Ok::<_, SchoolError>(classes.remove(idx))
    })?;
    let assignments = ASSIGNMENTS.update(store, |rows| assignments::forget_class(rows, id));
    info!(id, assignments, "class deleted");
    Ok(removed)
}

pub fn roster(store: &mut Store, class_id: i64) -> SchoolResult<(TeacherClass, Vec<Student>)> {
    let class = CLASSES
        .get(store)
        .into_iter()
        .find(|c| c.id == class_id)
        .ok_or_else(|| SchoolError::not_found("class", class_id))?;
    let students = STUDENTS.get(store);
    let roster = resolve::class_roster(&students, &class)
        .into_iter()
        .cloned()
        .collect();
    Ok((class, roster))
}
