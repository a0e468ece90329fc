use crate::ipc::error::err;
use crate::ipc::helpers::{finish, i64_param, param, params, reply, respond, role};
use crate::ipc::types::{AppState, Request};
use crate::model::ReadState;
use crate::stores::documents::{self, DocumentFilter, NewDocument};
use serde_json::Value;

fn handle_documents_list(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let filter: DocumentFilter = params(req)?;
    Ok(respond(req, documents::list(&mut state.store, &filter)))
}

fn handle_documents_create(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let input: NewDocument = params(req)?;
    Ok(reply(req, documents::create(&mut state.store, input)))
}

fn handle_documents_open(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, documents::open(&mut state.store, id)))
}

fn handle_documents_delete(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    Ok(reply(req, documents::delete(&mut state.store, id)))
}

fn handle_documents_summary(state: &mut AppState, req: &Request) -> Value {
    respond(req, documents::summary(&mut state.store))
}

fn handle_documents_folders(state: &mut AppState, req: &Request) -> Value {
    respond(req, documents::folders(&mut state.store))
}

fn handle_documents_create_folder(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let Some(name) = req.params.get("name").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing params.name", None));
    };
    Ok(reply(req, documents::create_folder(&mut state.store, name)))
}

fn handle_documents_reads(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let role = role(state, req)?;
    Ok(reply(req, documents::reads(&mut state.store, role)))
}

fn handle_documents_toggle_read(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let role = role(state, req)?;
    Ok(reply(req, documents::mark(&mut state.store, role, id, None)))
}

fn handle_documents_mark_read(state: &mut AppState, req: &Request) -> Result<Value, Value> {
    let id = i64_param(req, "id")?;
    let role = role(state, req)?;
    let status = match req.params.get("status") {
        Some(_) => param::<ReadState>(req, "status")?,
        None => ReadState::Read,
    };
    Ok(reply(req, documents::mark(&mut state.store, role, id, Some(status))))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "documents.list" => Some(finish(handle_documents_list(state, req))),
        "documents.create" => Some(finish(handle_documents_create(state, req))),
        "documents.open" => Some(finish(handle_documents_open(state, req))),
        "documents.delete" => Some(finish(handle_documents_delete(state, req))),
        "documents.summary" => Some(handle_documents_summary(state, req)),
        "documents.folders" => Some(handle_documents_folders(state, req)),
        "documents.createFolder" => Some(finish(handle_documents_create_folder(state, req))),
        "documents.reads" => Some(finish(handle_documents_reads(state, req))),
        "documents.toggleRead" => Some(finish(handle_documents_toggle_read(state, req))),
        "documents.markRead" => Some(finish(handle_documents_mark_read(state, req))),
        _ => None,
    }
}
