use super::{now_iso, profile, trimmed_or};
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::model::{Parent, ParentChild, RecordStatus, Student};
use crate::resolve::{self, LinkResolution};
use crate::store::{PersistedCell, Store};
use crate::stores::students::STUDENTS;
use serde::Deserialize;
use tracing::{info, warn};

pub const PARENTS: PersistedCell<Vec<Parent>> = PersistedCell::new("school.parents", Vec::new);

pub fn list(store: &mut Store, school_id: Option<&str>) -> Vec<Parent> {
    let all = PARENTS.get(store);
    resolve::scoped(&all, school_id).into_iter().cloned().collect()
}

pub fn get(store: &mut Store, id: i64) -> SchoolResult<Parent> {
    PARENTS
        .get(store)
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| SchoolError::not_found("parent", id))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub relationship: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRegistration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildInput>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// Resolves every non-blank identifier or fails listing the ones that did
/// not match. Duplicates collapse to one id, first occurrence wins.
fn resolve_identifiers(
    students: &[Student],
    school_id: Option<&str>,
    identifiers: &[&str],
) -> SchoolResult<Vec<Option<Student>>> {
    let visible = resolve::scoped(students, school_id);
    let mut missing = Vec::new();
    let mut out = Vec::with_capacity(identifiers.len());
    for raw in identifiers {
        let raw = raw.trim();
        if raw.is_empty() {
            out.push(None);
            continue;
        }
        match resolve::find_student_by_identifier(&visible, raw) {
            Some(s) => out.push(Some(s.clone())),
            None => missing.push(raw.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(SchoolError::MissingReference { ids: missing });
    }
    Ok(out)
}

fn push_unique(ids: &mut Vec<i64>, id: i64) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn status_for(links: &[i64]) -> RecordStatus {
    if links.is_empty() {
        RecordStatus::Pending
    } else {
        RecordStatus::Active
    }
}

pub fn register(store: &mut Store, input: ParentRegistration) -> SchoolResult<Parent> {
    if (input.password.is_some() || input.confirm_password.is_some())
        && input.password != input.confirm_password
    {
        return Err(SchoolError::validation("Passwords do not match."));
    }
    let school_id = profile::resolve_school_id(store, input.school_id.as_deref())?;
    let has_ids = input.children.iter().any(|c| !c.student_id.trim().is_empty());
    if has_ids && school_id.is_none() {
        return Err(SchoolError::validation(
            "Please enter the School ID to link student records.",
        ));
    }

    let students = STUDENTS.get(store);
    let identifiers: Vec<&str> = input.children.iter().map(|c| c.student_id.as_str()).collect();
    let matches = resolve_identifiers(&students, school_id.as_deref(), &identifiers)?;

    let mut linked = Vec::new();
    let children: Vec<ParentChild> = input
        .children
        .iter()
        .zip(&matches)
        .map(|(child, m)| match m {
            Some(s) => {
                push_unique(&mut linked, s.id);
                ParentChild {
                    name: s.name.clone(),
                    student_id: s.student_id.clone(),
                    grade: s.grade.clone(),
                    section: s.section.clone(),
                    relationship: child.relationship.trim().to_string(),
                }
            }
            None => ParentChild {
                name: child.name.trim().to_string(),
                student_id: child.student_id.trim().to_string(),
                grade: child.grade.trim().to_string(),
                section: child.section.trim().to_string(),
                relationship: child.relationship.trim().to_string(),
            },
        })
        .collect();

    let parent = PARENTS.update(store, |parents| {
        let id = ids::next_id(parents.iter().map(|p| p.id));
        let parent = Parent {
            id,
            parent_id: ids::parent_code(id),
            name: trimmed_or(input.name.as_deref(), "Parent"),
            email: input.email.trim().to_string(),
            phone: input.phone.trim().to_string(),
            relationship: input.relationship.trim().to_string(),
            school_id,
            status: status_for(&linked),
            linked_student_ids: linked,
            children,
            created_at: Some(now_iso()),
        };
        parents.push(parent.clone());
        parent
    });
    info!(
        id = parent.id,
        linked = parent.linked_student_ids.len(),
        "parent registered"
    );
    Ok(parent)
}

fn parent_scope(store: &mut Store, parent: &Parent) -> Option<String> {
    parent
        .school_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| profile::school_id(store))
}

/// Adds links by roll number, numeric id or student code. All identifiers
/// must resolve or nothing is written.
pub fn link(store: &mut Store, parent_id: i64, identifiers: &[String]) -> SchoolResult<Parent> {
    let parent = get(store, parent_id)?;
    let scope = parent_scope(store, &parent);
    let students = STUDENTS.get(store);
    let refs: Vec<&str> = identifiers.iter().map(String::as_str).collect();
    let matches = resolve_identifiers(&students, scope.as_deref(), &refs)?;

    let updated = PARENTS.try_update(store, |parents| {
        let p = parents
            .iter_mut()
            .find(|p| p.id == parent_id)
            .ok_or_else(|| SchoolError::not_found("parent", parent_id))?;
        for s in matches.iter().flatten() {
            push_unique(&mut p.linked_student_ids, s.id);
            if !p.children.iter().any(|c| c.student_id == s.student_id) {
                p.children.push(ParentChild {
                    name: s.name.clone(),
                    student_id: s.student_id.clone(),
                    grade: s.grade.clone(),
                    section: s.section.clone(),
                    relationship: String::new(),
                });
            }
        }
        p.status = status_for(&p.linked_student_ids);
        Ok::<_, SchoolError>(p.clone())
    })?;
    info!(id = parent_id, linked = updated.linked_student_ids.len(), "parent links added");
    Ok(updated)
}

pub fn unlink(store: &mut Store, parent_id: i64, student_id: i64) -> SchoolResult<Parent> {
    let code = ids::student_code(student_id);
    let updated = PARENTS.try_update(store, |parents| {
        let p = parents
            .iter_mut()
            .find(|p| p.id == parent_id)
            .ok_or_else(|| SchoolError::not_found("parent", parent_id))?;
        p.linked_student_ids.retain(|id| *id != student_id);
        p.children.retain(|c| c.student_id != code);
        p.status = status_for(&p.linked_student_ids);
        Ok::<_, SchoolError>(p.clone())
    })?;
    info!(id = parent_id, student_id, "parent link removed");
    Ok(updated)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub relationship: Option<String>,
    /// Replaces the whole link set. Resolved like `link`, all or nothing.
    pub student_ids: Option<Vec<String>>,
}

/// Edits contact details and, when `studentIds` is given, swaps the links.
/// Children kept across the swap keep their relationship label.
pub fn update(store: &mut Store, parent_id: i64, patch: ParentPatch) -> SchoolResult<Parent> {
    let parent = get(store, parent_id)?;
    let relinked = match &patch.student_ids {
        Some(identifiers) => {
            let scope = parent_scope(store, &parent);
            let students = STUDENTS.get(store);
            let refs: Vec<&str> = identifiers.iter().map(String::as_str).collect();
            Some(resolve_identifiers(&students, scope.as_deref(), &refs)?)
        }
        None => None,
    };

    let updated = PARENTS.try_update(store, |parents| {
        let p = parents
            .iter_mut()
            .find(|p| p.id == parent_id)
            .ok_or_else(|| SchoolError::not_found("parent", parent_id))?;
        if let Some(v) = patch.name {
            p.name = super::required(&v, "name")?;
        }
        if let Some(v) = patch.email {
            p.email = v.trim().to_string();
        }
        if let Some(v) = patch.phone {
            p.phone = v.trim().to_string();
        }
        if let Some(v) = patch.relationship {
            p.relationship = v.trim().to_string();
        }
        if let Some(matches) = relinked {
            let mut linked = Vec::new();
            let mut children = Vec::new();
            for s in matches.iter().flatten() {
                if linked.contains(&s.id) {
                    continue;
                }
                linked.push(s.id);
                let relationship = p
                    .children
                    .iter()
                    .find(|c| c.student_id.eq_ignore_ascii_case(&s.student_id))
                    .map(|c| c.relationship.clone())
                    .unwrap_or_default();
                children.push(ParentChild {
                    name: s.name.clone(),
                    student_id: s.student_id.clone(),
                    grade: s.grade.clone(),
                    section: s.section.clone(),
                    relationship,
                });
            }
            p.status = status_for(&linked);
            p.linked_student_ids = linked;
            p.children = children;
        }
        Ok::<_, SchoolError>(p.clone())
    })?;
    info!(id = parent_id, linked = updated.linked_student_ids.len(), "parent updated");
    Ok(updated)
}

pub fn delete(store: &mut Store, parent_id: i64) -> SchoolResult<Parent> {
    let removed = PARENTS.try_update(store, |parents| {
        let idx = parents
            .iter()
            .position(|p| p.id == parent_id)
            .ok_or_else(|| SchoolError::not_found("parent", parent_id))?;
        Ok::<_, SchoolError>(parents.remove(idx))
    })?;
    info!(id = parent_id, "parent deleted");
    Ok(removed)
}

/// Strips a removed student from every parent, both the numeric link and
/// the `children` entry carrying its code. Returns the parents touched.
pub(crate) fn forget_student(parents: &mut [Parent], student: &Student) -> usize {
    let mut touched = 0;
    for p in parents.iter_mut() {
        let before = (p.linked_student_ids.len(), p.children.len());
        p.linked_student_ids.retain(|id| *id != student.id);
        p.children
            .retain(|c| !c.student_id.trim().eq_ignore_ascii_case(&student.student_id));
        if before != (p.linked_student_ids.len(), p.children.len()) {
            p.status = status_for(&p.linked_student_ids);
            touched += 1;
        }
    }
    touched
}

/// Resolves the parent's linked students and drops links to students that
/// are gone or outside the school, persisting the cleaned list.
pub fn children(store: &mut Store, parent_id: i64) -> SchoolResult<LinkResolution> {
    let parent = get(store, parent_id)?;
    let scope = parent_scope(store, &parent);
    let students = STUDENTS.get(store);
    let resolution = resolve::resolve_linked_students(&parent, &students, scope.as_deref());

    let kept_codes: Vec<String> = resolution
        .students
        .iter()
        .map(|s| s.student_id.clone())
        .collect();
    let keeps_code = |code: &str| {
        let code = code.trim();
        code.is_empty() || kept_codes.iter().any(|k| k.eq_ignore_ascii_case(code))
    };
    let stale_children = parent.children.iter().any(|c| !keeps_code(&c.student_id));

    if resolution.needs_rewrite() || stale_children {
        warn!(
            id = parent_id,
            dropped = ?resolution.dropped,
            stale_children,
            "dropping stale parent links"
        );
        let kept = resolution.linked_ids.clone();
        PARENTS.update(store, |parents| {
            if let Some(p) = parents.iter_mut().find(|p| p.id == parent_id) {
                p.children.retain(|c| keeps_code(&c.student_id));
                p.status = status_for(&kept);
                p.linked_student_ids = kept;
            }
        });
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::students::{self, StudentRegistration};
    use crate::stores::testutil::store;

    fn seed(store: &mut Store, n: usize, school: &str) {
        for _ in 0..n {
            students::register(
                store,
                StudentRegistration {
                    school_id: Some(school.into()),
                    ..Default::default()
                },
            )
            .expect("student");
        }
    }

    fn child(id: &str) -> ChildInput {
        ChildInput {
            student_id: id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn register_links_by_roll_id_or_code() {
        let mut s = store();
        seed(&mut s, 3, "SCH-1");
        let p = register(
            &mut s,
            ParentRegistration {
                school_id: Some("SCH-1".into()),
                children: vec![child("2024001"), child("2"), child("std-0003"), child("2")],
                ..Default::default()
            },
        )
        .expect("register");
        assert_eq!(p.linked_student_ids, vec![1, 2, 3]);
        assert_eq!(p.parent_id, "PAR-0001");
        assert_eq!(p.status, RecordStatus::Active);
        assert_eq!(p.children[0].student_id, "STD-0001");
    }

    #[test]
    fn unmatched_identifiers_abort_registration() {
        let mut s = store();
        seed(&mut s, 1, "SCH-1");
        let err = register(
            &mut s,
            ParentRegistration {
                school_id: Some("SCH-1".into()),
                children: vec![child("2024001"), child("2024077"), child("X-1")],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchoolError::MissingReference {
                ids: vec!["2024077".into(), "X-1".into()]
            }
        );
        assert!(list(&mut s, None).is_empty());
    }

    #[test]
    fn identifiers_without_school_are_rejected() {
        let mut s = store();
        let err = register(
            &mut s,
            ParentRegistration {
                children: vec![child("2024001")],
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_params");

        let p = register(&mut s, ParentRegistration::default()).expect("no children");
        assert_eq!(p.status, RecordStatus::Pending);
    }

    #[test]
    fn deleting_a_student_strips_it_from_parents() {
        let mut s = store();
        seed(&mut s, 9, "SCH-1");
        let p = register(
            &mut s,
            ParentRegistration {
                school_id: Some("SCH-1".into()),
                ..Default::default()
            },
        )
        .expect("parent");
        link(&mut s, p.id, &["5".to_string(), "9".to_string()]).expect("link");
        students::delete(&mut s, 9).expect("delete");

        let stored = get(&mut s, p.id).expect("parent");
        assert_eq!(stored.linked_student_ids, vec![5]);
        assert_eq!(stored.children.len(), 1);
        assert_eq!(stored.children[0].student_id, "STD-0005");

        let res = children(&mut s, p.id).expect("children");
        assert_eq!(res.linked_ids, vec![5]);
        assert!(res.dropped.is_empty());
    }

    #[test]
    fn stale_links_written_elsewhere_are_reconciled() {
        let mut s = store();
        seed(&mut s, 2, "SCH-1");
        let p = register(
            &mut s,
            ParentRegistration {
                school_id: Some("SCH-1".into()),
                children: vec![child("1"), child("2")],
                ..Default::default()
            },
        )
        .expect("parent");

        // Another writer left a link and a child entry for a missing student.
        let mut parents = PARENTS.get(&mut s);
        parents[0].linked_student_ids.push(7);
        parents[0].children.push(ParentChild {
            name: "Gone".into(),
            student_id: "STD-0007".into(),
            grade: String::new(),
            section: String::new(),
            relationship: String::new(),
        });
        PARENTS.set(&mut s, &parents);

        let res = children(&mut s, p.id).expect("children");
        assert_eq!(res.dropped, vec![7]);
        let stored = get(&mut s, p.id).expect("parent");
        assert_eq!(stored.linked_student_ids, vec![1, 2]);
        let codes: Vec<&str> = stored.children.iter().map(|c| c.student_id.as_str()).collect();
        assert_eq!(codes, vec!["STD-0001", "STD-0002"]);
        assert_eq!(stored.status, RecordStatus::Active);

        // A stray child code alone is enough to trigger the rewrite.
        let mut parents = PARENTS.get(&mut s);
        let mut stray = parents[0].children[0].clone();
        stray.student_id = "std-0009".into();
        parents[0].children.push(stray);
        PARENTS.set(&mut s, &parents);
        let res = children(&mut s, p.id).expect("children");
        assert!(res.dropped.is_empty());
        assert_eq!(get(&mut s, p.id).expect("parent").children.len(), 2);
    }

    #[test]
    fn update_swaps_links_and_keeps_relationships() {
        let mut s = store();
        seed(&mut s, 3, "SCH-1");
        let p = register(
            &mut s,
            ParentRegistration {
                school_id: Some("SCH-1".into()),
                children: vec![
                    ChildInput {
                        student_id: "1".into(),
                        relationship: "Mother".into(),
                        ..Default::default()
                    },
                    child("2"),
                ],
                ..Default::default()
            },
        )
        .expect("parent");

        let err = update(
            &mut s,
            p.id,
            ParentPatch {
                name: Some("Renamed".into()),
                student_ids: Some(vec!["1".into(), "2024077".into()]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "missing_reference");
        assert_eq!(get(&mut s, p.id).expect("parent").name, "Parent");

        let updated = update(
            &mut s,
            p.id,
            ParentPatch {
                phone: Some(" 024 555 0101 ".into()),
                student_ids: Some(vec!["3".into(), "2024001".into()]),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!(updated.phone, "024 555 0101");
        assert_eq!(updated.linked_student_ids, vec![3, 1]);
        assert_eq!(updated.children[1].relationship, "Mother");

        let cleared = update(
            &mut s,
            p.id,
            ParentPatch {
                student_ids: Some(Vec::new()),
                ..Default::default()
            },
        )
        .expect("clear");
        assert!(cleared.children.is_empty());
        assert_eq!(cleared.status, RecordStatus::Pending);
    }

    #[test]
    fn delete_removes_only_that_parent() {
        let mut s = store();
        register(&mut s, ParentRegistration::default()).expect("first");
        register(&mut s, ParentRegistration::default()).expect("second");
        assert_eq!(delete(&mut s, 1).expect("delete").parent_id, "PAR-0001");
        assert_eq!(delete(&mut s, 1).unwrap_err().code(), "not_found");
        let left: Vec<i64> = list(&mut s, None).iter().map(|p| p.id).collect();
        assert_eq!(left, vec![2]);
    }

    #[test]
    fn unlink_last_child_makes_parent_pending() {
        let mut s = store();
        seed(&mut s, 1, "SCH-1");
        let p = register(
            &mut s,
            ParentRegistration {
                school_id: Some("SCH-1".into()),
                children: vec![child("1")],
                ..Default::default()
            },
        )
        .expect("parent");
        let p = unlink(&mut s, p.id, 1).expect("unlink");
        assert!(p.linked_student_ids.is_empty());
        assert!(p.children.is_empty());
        assert_eq!(p.status, RecordStatus::Pending);
    }
}
