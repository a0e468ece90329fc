use super::{required, today};
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::model::{Document, DocumentStatus, ReadState, Role};
use crate::store::{PersistedCell, Store};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const DOCUMENTS: PersistedCell<Vec<Document>> =
    PersistedCell::new("school.documents", Vec::new);
pub const FOLDERS: PersistedCell<Vec<String>> =
    PersistedCell::new("school.documentFolders", Vec::new);

type ReadMap = BTreeMap<i64, ReadState>;

pub const PARENT_READS: PersistedCell<ReadMap> =
    PersistedCell::new("school.documentReads.parent", BTreeMap::new);
pub const STUDENT_READS: PersistedCell<ReadMap> =
    PersistedCell::new("school.documentReads.student", BTreeMap::new);

/// Only parents and students keep read state.
fn reads_for(role: Role) -> SchoolResult<PersistedCell<ReadMap>> {
    match role {
        Role::Parent => Ok(PARENT_READS),
        Role::Student => Ok(STUDENT_READS),
        Role::Admin | Role::Teacher => Err(SchoolError::validation(
            "document read state is kept for parents and students only",
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentSort {
    #[default]
    Updated,
    Owner,
    Category,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFilter {
    pub category: Option<String>,
    pub owner: Option<String>,
    pub status: Option<DocumentStatus>,
    /// Matches name or owner, case-insensitive.
    pub search: Option<String>,
    #[serde(default)]
    pub sort: DocumentSort,
}

impl DocumentFilter {
    fn matches(&self, d: &Document) -> bool {
        let search = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        self.category.as_deref().map(|c| c == d.category).unwrap_or(true)
            && self.owner.as_deref().map(|o| o == d.owner).unwrap_or(true)
            && self.status.map(|s| s == d.status).unwrap_or(true)
            && search
                .map(|s| d.name.to_lowercase().contains(&s) || d.owner.to_lowercase().contains(&s))
                .unwrap_or(true)
    }
}

pub fn list(store: &mut Store, filter: &DocumentFilter) -> Vec<Document> {
    let mut out: Vec<Document> = DOCUMENTS
        .get(store)
        .into_iter()
        .filter(|d| filter.matches(d))
        .collect();
    match filter.sort {
        DocumentSort::Updated => out.sort_by(|a, b| (&b.updated, b.id).cmp(&(&a.updated, a.id))),
        DocumentSort::Owner => out.sort_by(|a, b| a.owner.cmp(&b.owner)),
        DocumentSort::Category => out.sort_by(|a, b| a.category.cmp(&b.category)),
    }
    out
}

pub fn folders(store: &mut Store) -> Vec<String> {
    FOLDERS.get(store)
}

/// Adds a folder unless one with the same name exists.
pub fn create_folder(store: &mut Store, name: &str) -> SchoolResult<Vec<String>> {
    let name = required(name, "name")?;
    let out = FOLDERS.update(store, |folders| {
        if !folders.contains(&name) {
            folders.push(name.clone());
            info!(folder = %name, "document folder created");
        }
        folders.clone()
    });
    Ok(out)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub name: String,
    pub category: String,
    pub owner: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: DocumentStatus,
}

pub fn create(store: &mut Store, input: NewDocument) -> SchoolResult<Document> {
    let name = required(&input.name, "name")?;
    let category = required(&input.category, "category")?;
    let owner = required(&input.owner, "owner")?;
    create_folder(store, &category)?;

    let doc = DOCUMENTS.update(store, |docs| {
        let doc = Document {
            id: ids::next_id(docs.iter().map(|d| d.id)),
            name,
            category,
            kind: input.kind.trim().to_string(),
            owner,
            status: input.status,
            updated: today().format("%Y-%m-%d").to_string(),
        };
        docs.push(doc.clone());
        doc
    });
    info!(id = doc.id, category = %doc.category, "document created");
    Ok(doc)
}

/// Opening moves the document along its review path and stamps it.
pub fn open(store: &mut Store, id: i64) -> SchoolResult<Document> {
    let doc = DOCUMENTS.try_update(store, |docs| {
        let d = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| SchoolError::not_found("document", id))?;
        d.status = d.status.on_open();
        d.updated = today().format("%Y-%m-%d").to_string();
        Ok::<_, SchoolError>(d.clone())
    })?;
    info!(id, status = ?doc.status, "document opened");
    Ok(doc)
}

pub fn delete(store: &mut Store, id: i64) -> SchoolResult<Document> {
    let removed = DOCUMENTS.try_update(store, |docs| {
        let idx = docs
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| SchoolError::not_found("document", id))?;
        Ok::<_, SchoolError>(docs.remove(idx))
    })?;
    for cell in [PARENT_READS, STUDENT_READS] {
        cell.update(store, |map| map.remove(&id));
    }
    info!(id, "document deleted");
    Ok(removed)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderDocument {
    #[serde(flatten)]
    pub document: Document,
    pub read_status: ReadState,
}

/// Every document with the role's read state, in `list` order.
pub fn reads(store: &mut Store, role: Role) -> SchoolResult<Vec<ReaderDocument>> {
    let map = reads_for(role)?.get(store);
    Ok(list(store, &DocumentFilter::default())
        .into_iter()
        .map(|document| ReaderDocument {
            read_status: map.get(&document.id).copied().unwrap_or_default(),
            document,
        })
        .collect())
}

/// Sets the role's read state for one document; `None` flips it.
pub fn mark(
    store: &mut Store,
    role: Role,
    id: i64,
    state: Option<ReadState>,
) -> SchoolResult<ReaderDocument> {
    let cell = reads_for(role)?;
    let document = DOCUMENTS
        .get(store)
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| SchoolError::not_found("document", id))?;
    let read_status = cell.update(store, |map| {
        let current = map.get(&id).copied().unwrap_or_default();
        let next = state.unwrap_or_else(|| current.toggled());
        map.insert(id, next);
        next
    });
    info!(id, role = role.title(), status = ?read_status, "document read state set");
    Ok(ReaderDocument {
        document,
        read_status,
    })
}

/// Documents the role has not marked read.
pub fn unread_count(store: &mut Store, role: Role) -> SchoolResult<usize> {
    let map = reads_for(role)?.get(store);
    Ok(DOCUMENTS
        .get(store)
        .iter()
        .filter(|d| map.get(&d.id).copied().unwrap_or_default() == ReadState::Unread)
        .count())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub total: usize,
    pub approved: usize,
    pub pending_review: usize,
    pub expiring_soon: usize,
    pub folders: Vec<FolderCount>,
}

pub fn summary(store: &mut Store) -> DocumentSummary {
    let docs = DOCUMENTS.get(store);
    let count = |status: DocumentStatus| docs.iter().filter(|d| d.status == status).count();
    let approved = count(DocumentStatus::Approved);
    DocumentSummary {
        total: docs.len(),
        approved,
        pending_review: docs.len() - approved,
        expiring_soon: count(DocumentStatus::ExpiringSoon),
        folders: FOLDERS
            .get(store)
            .into_iter()
            .map(|name| FolderCount {
                count: docs.iter().filter(|d| d.category == name).count(),
                name,
            })
            .collect(),
    }
}
