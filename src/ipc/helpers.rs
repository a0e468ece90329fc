use crate::error::SchoolResult;
use crate::ipc::error::{err, ok, school_err};
use crate::ipc::types::{AppState, Request};
use crate::metrics;
use crate::model::Role;
use crate::stores::{self, profile};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

/// Decodes `params` into `T`. Missing params decode like an empty object.
pub fn params<T: DeserializeOwned>(req: &Request) -> Result<T, Value> {
    let raw = match &req.params {
        Value::Null => json!({}),
        other => other.clone(),
    };
    serde_json::from_value(raw).map_err(|e| err(&req.id, "bad_params", format!("invalid params: {}", e), None))
}

/// Decodes `params[key]` into `T`.
pub fn param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing params.{}", key), None));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid params.{}: {}", key, e), None))
}

pub fn i64_param(req: &Request, key: &str) -> Result<i64, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{}", key), None))
}

/// `params.asOf` as a date, defaulting to today.
pub fn as_of(req: &Request) -> Result<NaiveDate, Value> {
    match req.params.get("asOf").and_then(|v| v.as_str()) {
        None => Ok(stores::today()),
        Some(raw) => metrics::parse_date(raw)
            .ok_or_else(|| err(&req.id, "bad_params", "asOf must be YYYY-MM-DD", None)),
    }
}

/// `params.role`, or the session role when omitted.
pub fn role(state: &mut AppState, req: &Request) -> Result<Role, Value> {
    if let Some(raw) = req.params.get("role").and_then(|v| v.as_str()) {
        return Role::parse(raw)
            .ok_or_else(|| err(&req.id, "bad_params", format!("unknown role: {}", raw), None));
    }
    profile::session_role(&mut state.store)
        .ok_or_else(|| err(&req.id, "bad_params", "missing params.role", None))
}

pub fn respond<T: Serialize>(req: &Request, value: T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

pub fn reply<T: Serialize>(req: &Request, result: SchoolResult<T>) -> Value {
    match result {
        Ok(v) => respond(req, v),
        Err(e) => school_err(&req.id, &e),
    }
}

/// Collapses a handler outcome; failures are already error responses.
pub fn finish(outcome: Result<Value, Value>) -> Value {
    outcome.unwrap_or_else(|resp| resp)
}
