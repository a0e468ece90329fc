use super::{now_iso, profile, required};
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::model::{RecordStatus, Teacher};
use crate::resolve;
use crate::store::{PersistedCell, Store};
use serde::Deserialize;
use tracing::info;

pub const TEACHERS: PersistedCell<Vec<Teacher>> = PersistedCell::new("school.teachers", Vec::new);

pub fn list(store: &mut Store, school_id: Option<&str>) -> Vec<Teacher> {
    let all = TEACHERS.get(store);
    resolve::scoped(&all, school_id).into_iter().cloned().collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRegistration {
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

pub fn register(store: &mut Store, input: TeacherRegistration) -> SchoolResult<Teacher> {
    if (input.password.is_some() || input.confirm_password.is_some())
        && input.password != input.confirm_password
    {
        return Err(SchoolError::validation("Passwords do not match."));
    }
    let name = required(&input.name, "name")?;
    let school_id = profile::resolve_school_id(store, input.school_id.as_deref())?;

    let teacher = TEACHERS.update(store, |teachers| {
        let id = ids::next_id(teachers.iter().map(|t| t.id));
        let teacher = Teacher {
            id,
            emp_id: ids::employee_code(id),
            name,
            department: input.department.trim().to_string(),
            subjects: clean_subjects(&input.subjects),
            email: input.email.trim().to_string(),
            phone: input.phone.trim().to_string(),
            status: RecordStatus::Active,
            school_id,
            created_at: Some(now_iso()),
        };
        teachers.push(teacher.clone());
        teacher
    });
    info!(id = teacher.id, emp_id = %teacher.emp_id, "teacher registered");
    Ok(teacher)
}

fn clean_subjects(subjects: &[String]) -> Vec<String> {
    subjects
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TeacherPatch {
    pub name: Option<String>,
    pub department: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<RecordStatus>,
}

pub fn update(store: &mut Store, id: i64, patch: TeacherPatch) -> SchoolResult<Teacher> {
    let updated = TEACHERS.try_update(store, |teachers| {
        let t = teachers
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SchoolError::not_found("teacher", id))?;
        if let Some(v) = patch.name {
            t.name = required(&v, "name")?;
        }
        if let Some(v) = patch.department {
            t.department = v.trim().to_string();
        }
        if let Some(v) = patch.subjects {
            t.subjects = clean_subjects(&v);
        }
        if let Some(v) = patch.email {
            t.email = v.trim().to_string();
        }
        if let Some(v) = patch.phone {
            t.phone = v.trim().to_string();
        }
        if let Some(v) = patch.status {
            t.status = v;
        }
        Ok::<_, SchoolError>(t.clone())
    })?;
    info!(id, "teacher updated");
    Ok(updated)
}

pub fn delete(store: &mut Store, id: i64) -> SchoolResult<Teacher> {
    let removed = TEACHERS.try_update(store, |teachers| {
        let idx = teachers
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| SchoolError::not_found("teacher", id))?;
        Ok::<_, SchoolError>(teachers.remove(idx))
    })?;
    info!(id, emp_id = %removed.emp_id, "teacher deleted");
    Ok(removed)
}

/// Active goes Inactive; every other status comes back to Active.
pub fn toggle_status(store: &mut Store, id: i64) -> SchoolResult<Teacher> {
    let updated = TEACHERS.try_update(store, |teachers| {
        let t = teachers
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SchoolError::not_found("teacher", id))?;
        t.status = match t.status {
            RecordStatus::Active => RecordStatus::Inactive,
            _ => RecordStatus::Active,
        };
        Ok::<_, SchoolError>(t.clone())
    })?;
    info!(id, status = ?updated.status, "teacher status toggled");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::testutil::store;

    #[test]
    fn employee_codes_follow_ids() {
        let mut s = store();
        let input = || TeacherRegistration {
            name: "Grace".into(),
            subjects: vec!["Physics".into(), " ".into()],
            ..Default::default()
        };
        register(&mut s, input()).expect("first");
        let second = register(&mut s, input()).expect("second");
        assert_eq!(second.emp_id, "EMP-002");
        assert_eq!(second.subjects, vec!["Physics".to_string()]);
        assert_eq!(list(&mut s, None).len(), 2);
    }

    #[test]
    fn update_toggle_and_delete() {
        let mut s = store();
        register(
            &mut s,
            TeacherRegistration {
                name: "Grace".into(),
                department: "Science".into(),
                ..Default::default()
            },
        )
        .expect("register");

        let t = update(
            &mut s,
            1,
            TeacherPatch {
                department: Some(" Mathematics ".into()),
                subjects: Some(vec!["Algebra".into(), "".into()]),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!(t.department, "Mathematics");
        assert_eq!(t.subjects, vec!["Algebra".to_string()]);
        assert_eq!(t.name, "Grace");

        let blank = TeacherPatch {
            name: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(update(&mut s, 1, blank).unwrap_err().code(), "bad_params");

        assert_eq!(toggle_status(&mut s, 1).expect("off").status, RecordStatus::Inactive);
        assert_eq!(toggle_status(&mut s, 1).expect("on").status, RecordStatus::Active);

        delete(&mut s, 1).expect("delete");
        assert!(list(&mut s, None).is_empty());
        assert_eq!(toggle_status(&mut s, 1).unwrap_err().code(), "not_found");
    }

    #[test]
    fn unknown_patch_fields_are_rejected() {
        let err = serde_json::from_value::<TeacherPatch>(serde_json::json!({ "salary": 10 }));
        assert!(err.is_err());
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut s = store();
        let err = register(&mut s, TeacherRegistration::default()).unwrap_err();
        assert_eq!(err.code(), "bad_params");
    }
}
