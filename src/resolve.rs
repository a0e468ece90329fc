//! Joins and filters across entity collections. Nothing in here touches the
//! store; callers decide what to persist.

use crate::model::{
    MessageThread, Parent, Payment, ResultRow, Role, Student, TeacherClass, ThreadParticipant,
};
use std::collections::{HashMap, HashSet};

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Records carrying their own `schoolId`.
pub trait SchoolScoped {
    fn school_id(&self) -> Option<&str>;
}

impl SchoolScoped for Student {
    fn school_id(&self) -> Option<&str> {
        self.school_id.as_deref()
    }
}

impl SchoolScoped for Parent {
    fn school_id(&self) -> Option<&str> {
        self.school_id.as_deref()
    }
}

impl SchoolScoped for crate::model::Teacher {
    fn school_id(&self) -> Option<&str> {
        self.school_id.as_deref()
    }
}

/// An absent or blank scope matches everything.
pub fn in_school<T: SchoolScoped>(record: &T, school_id: Option<&str>) -> bool {
    match school_id.map(normalize).filter(|s| !s.is_empty()) {
        None => true,
        Some(scope) => record
            .school_id()
            .map(|s| normalize(s) == scope)
            .unwrap_or(false),
    }
}

pub fn scoped<'a, T: SchoolScoped>(records: &'a [T], school_id: Option<&str>) -> Vec<&'a T> {
    records
        .iter()
        .filter(|r| in_school(*r, school_id))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkResolution {
    /// Linked students in `linkedStudentIds` order.
    pub students: Vec<Student>,
    pub linked_ids: Vec<i64>,
    /// Ids that no longer match a visible student.
    pub dropped: Vec<i64>,
}

impl LinkResolution {
    pub fn needs_rewrite(&self) -> bool {
        !self.dropped.is_empty()
    }
}

pub fn resolve_linked_students(
    parent: &Parent,
    students: &[Student],
    school_id: Option<&str>,
) -> LinkResolution {
    let visible: HashMap<i64, &Student> = scoped(students, school_id)
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let mut seen = HashSet::new();
    let mut out = LinkResolution {
        students: Vec::new(),
        linked_ids: Vec::new(),
        dropped: Vec::new(),
    };
    for id in &parent.linked_student_ids {
        match visible.get(id) {
            Some(student) if seen.insert(*id) => {
                out.linked_ids.push(*id);
                out.students.push((*student).clone());
            }
            Some(_) => {}
            None => out.dropped.push(*id),
        }
    }
    out
}

pub fn in_class(student: &Student, class: &TeacherClass) -> bool {
    student.grade == class.grade && student.section == class.section
}

pub fn class_roster<'a>(students: &'a [Student], class: &TeacherClass) -> Vec<&'a Student> {
    students.iter().filter(|s| in_class(s, class)).collect()
}

pub fn roster_count(students: &[Student], class: &TeacherClass) -> usize {
    students.iter().filter(|s| in_class(s, class)).count()
}

/// Students sitting in at least one of `classes`, each counted once.
pub fn students_in_classes<'a>(
    students: &'a [Student],
    classes: &[TeacherClass],
) -> Vec<&'a Student> {
    let tuples: HashSet<(&str, &str)> = classes
        .iter()
        .map(|c| (c.grade.as_str(), c.section.as_str()))
        .collect();
    students
        .iter()
        .filter(|s| tuples.contains(&(s.grade.as_str(), s.section.as_str())))
        .collect()
}

/// Lowercased roll number -> student id.
#[derive(Debug, Clone, Default)]
pub struct RollIndex {
    by_roll: HashMap<String, i64>,
}

impl RollIndex {
    pub fn build(students: &[Student]) -> Self {
        let by_roll = students
            .iter()
            .filter(|s| !s.roll_number.trim().is_empty())
            .map(|s| (normalize(&s.roll_number), s.id))
            .collect();
        Self { by_roll }
    }

    pub fn lookup(&self, roll: &str) -> Option<i64> {
        self.by_roll.get(&normalize(roll)).copied()
    }
}

/// Payments and results point at a student by numeric id; rows written
/// before that key existed fall back to the roll number.
pub trait StudentOwned {
    fn owner_id(&self) -> Option<i64>;
    fn owner_roll(&self) -> &str;
}

impl StudentOwned for Payment {
    fn owner_id(&self) -> Option<i64> {
        self.student_id
    }
    fn owner_roll(&self) -> &str {
        &self.roll_no
    }
}

impl StudentOwned for ResultRow {
    fn owner_id(&self) -> Option<i64> {
        self.student_id
    }
    fn owner_roll(&self) -> &str {
        &self.roll_no
    }
}

pub fn owned_by<T: StudentOwned>(row: &T, student: &Student) -> bool {
    match row.owner_id() {
        Some(id) => id == student.id,
        None => normalize(row.owner_roll()) == normalize(&student.roll_number),
    }
}

pub fn rows_for_students<'a, T: StudentOwned>(rows: &'a [T], students: &[Student]) -> Vec<&'a T> {
    let ids: HashSet<i64> = students.iter().map(|s| s.id).collect();
    let rolls: HashSet<String> = students.iter().map(|s| normalize(&s.roll_number)).collect();
    rows.iter()
        .filter(|r| match r.owner_id() {
            Some(id) => ids.contains(&id),
            None => rolls.contains(&normalize(r.owner_roll())),
        })
        .collect()
}

/// Matches a roll number, a numeric id or a `STD-` code, ignoring case.
pub fn find_student_by_identifier<'a>(
    students: &[&'a Student],
    identifier: &str,
) -> Option<&'a Student> {
    let needle = normalize(identifier);
    if needle.is_empty() {
        return None;
    }
    let numeric = needle.parse::<i64>().ok();
    students
        .iter()
        .find(|s| {
            normalize(&s.roll_number) == needle
                || numeric == Some(s.id)
                || (!s.student_id.is_empty() && normalize(&s.student_id) == needle)
        })
        .copied()
}

pub fn threads_for_role(threads: &[MessageThread], role: Role) -> Vec<&MessageThread> {
    threads.iter().filter(|t| t.has_role(role)).collect()
}

/// First participant of another role, or the first participant at all.
pub fn counterpart(thread: &MessageThread, role: Role) -> Option<&ThreadParticipant> {
    thread
        .participants
        .iter()
        .find(|p| p.role != role)
        .or_else(|| thread.participants.first())
}
