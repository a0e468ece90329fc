use crate::error::{SchoolError, SchoolResult};
use crate::model::{Role, SchoolProfile, Session};
use crate::store::{PersistedCell, Store};
use serde::Deserialize;
use tracing::info;

pub const PROFILE: PersistedCell<SchoolProfile> =
    PersistedCell::new("school.profile", SchoolProfile::default);

pub const SESSION: PersistedCell<Option<Session>> = PersistedCell::new("school.session", no_session);

fn no_session() -> Option<Session> {
    None
}

pub fn get(store: &mut Store) -> SchoolProfile {
    PROFILE.get(store)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub school_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub classes_offered: Option<Vec<String>>,
}

pub fn update(store: &mut Store, patch: ProfilePatch) -> SchoolProfile {
    let updated = PROFILE.update(store, |p| {
        let set = |field: &mut String, v: Option<String>| {
            if let Some(v) = v {
                *field = v.trim().to_string();
            }
        };
        set(&mut p.name, patch.name);
        set(&mut p.school_id, patch.school_id);
        set(&mut p.kind, patch.kind);
        set(&mut p.address, patch.address);
        set(&mut p.city, patch.city);
        set(&mut p.country, patch.country);
        set(&mut p.email, patch.email);
        set(&mut p.phone, patch.phone);
        if let Some(classes) = patch.classes_offered {
            p.classes_offered = classes
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        p.clone()
    });
    info!(school_id = %updated.school_id, "school profile updated");
    updated
}

/// The school id from the profile, if one has been set.
pub fn school_id(store: &mut Store) -> Option<String> {
    let id = PROFILE.get(store).school_id;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Input school ids are checked against the profile only when both exist.
pub fn resolve_school_id(store: &mut Store, requested: Option<&str>) -> SchoolResult<Option<String>> {
    let stored = school_id(store);
    let requested = requested.map(str::trim).filter(|s| !s.is_empty());
    match (requested, stored) {
        (Some(r), Some(s)) if r != s => Err(SchoolError::validation(
            "School ID not found. Please confirm the ID provided by your school.",
        )),
        (Some(r), _) => Ok(Some(r.to_string())),
        (None, s) => Ok(s),
    }
}

pub fn session(store: &mut Store) -> Option<Session> {
    SESSION.get(store)
}

pub fn require_session(store: &mut Store) -> SchoolResult<Session> {
    session(store).ok_or(SchoolError::NoSession)
}

pub fn set_session(store: &mut Store, session: Option<Session>) {
    if let Some(s) = &session {
        info!(role = ?s.role, "session set");
    }
    SESSION.set(store, &session);
}

pub fn session_role(store: &mut Store) -> Option<Role> {
    session(store).map(|s| s.role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::testutil::store;

    #[test]
    fn school_id_mismatch_is_rejected() {
        let mut s = store();
        assert_eq!(resolve_school_id(&mut s, Some("SCH-9")).expect("no profile"), Some("SCH-9".into()));

        update(
            &mut s,
            ProfilePatch {
                school_id: Some(" SCH-1 ".into()),
                ..Default::default()
            },
        );
        assert_eq!(resolve_school_id(&mut s, None).expect("inherit"), Some("SCH-1".into()));
        assert_eq!(resolve_school_id(&mut s, Some("SCH-1")).expect("match"), Some("SCH-1".into()));
        let err = resolve_school_id(&mut s, Some("SCH-2")).unwrap_err();
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn session_roundtrip() {
        let mut s = store();
        assert_eq!(require_session(&mut s).unwrap_err(), SchoolError::NoSession);
        set_session(
            &mut s,
            Some(Session {
                id: "u-1".into(),
                role: Role::Teacher,
                name: "Ms. Rivera".into(),
                email: String::new(),
            }),
        );
        assert_eq!(session_role(&mut s), Some(Role::Teacher));
    }
}
