use super::required;
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::metrics;
use crate::model::SchoolEvent;
use crate::store::{PersistedCell, Store};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

pub const EVENTS: PersistedCell<Vec<SchoolEvent>> = PersistedCell::new("school.events", Vec::new);

pub fn list(store: &mut Store) -> Vec<SchoolEvent> {
    EVENTS.get(store)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Option<u32>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn checked_date(raw: &str) -> SchoolResult<String> {
    metrics::parse_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| SchoolError::validation("date must be YYYY-MM-DD"))
}

fn text(v: &Option<String>) -> String {
    v.as_deref().map(str::trim).unwrap_or_default().to_string()
}

pub fn create(store: &mut Store, input: EventInput) -> SchoolResult<SchoolEvent> {
    let title = required(input.title.as_deref().unwrap_or_default(), "title")?;
    let date = checked_date(input.date.as_deref().unwrap_or_default())?;
    let event = EVENTS.update(store, |events| {
        let event = SchoolEvent {
            id: ids::next_id(events.iter().map(|e| e.id)),
            title,
            date,
            time: text(&input.time),
            location: text(&input.location),
            attendees: input.attendees.unwrap_or(0),
            kind: input
                .kind
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .unwrap_or("General")
                .to_string(),
            priority: input
                .priority
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .unwrap_or("Medium")
                .to_string(),
            organizer: text(&input.organizer),
            description: text(&input.description),
        };
        events.push(event.clone());
        event
    });
    info!(id = event.id, date = %event.date, "event created");
    Ok(event)
}

/// Applies only the fields present in `patch`.
pub fn update(store: &mut Store, id: i64, patch: EventInput) -> SchoolResult<SchoolEvent> {
    let title = match patch.title.as_deref() {
        Some(t) => Some(required(t, "title")?),
        None => None,
    };
    let date = match patch.date.as_deref() {
        Some(d) => Some(checked_date(d)?),
        None => None,
    };
    let event = EVENTS.try_update(store, |events| {
        let e = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| SchoolError::not_found("event", id))?;
        if let Some(v) = title {
            e.title = v;
        }
        if let Some(v) = date {
            e.date = v;
        }
        if patch.time.is_some() {
            e.time = text(&patch.time);
        }
        if patch.location.is_some() {
            e.location = text(&patch.location);
        }
        if let Some(v) = patch.attendees {
            e.attendees = v;
        }
        if patch.kind.is_some() {
            e.kind = text(&patch.kind);
        }
        if patch.priority.is_some() {
            e.priority = text(&patch.priority);
        }
        if patch.organizer.is_some() {
            e.organizer = text(&patch.organizer);
        }
        if patch.description.is_some() {
            e.description = text(&patch.description);
        }
        Ok::<_, SchoolError>(e.clone())
    })?;
    info!(id, "event updated");
    Ok(event)
}

pub fn delete(store: &mut Store, id: i64) -> SchoolResult<SchoolEvent> {
    let removed = EVENTS.try_update(store, |events| {
        let idx = events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| SchoolError::not_found("event", id))?;
        Ok::<_, SchoolError>(events.remove(idx))
    })?;
    info!(id, "event deleted");
    Ok(removed)
}

/// Events on or after `as_of`, soonest first. Undated events are skipped.
pub fn upcoming_from(events: &[SchoolEvent], as_of: NaiveDate, limit: usize) -> Vec<SchoolEvent> {
    let mut dated: Vec<(NaiveDate, &SchoolEvent)> = events
        .iter()
        .filter_map(|e| metrics::parse_date(&e.date).map(|d| (d, e)))
        .filter(|(d, _)| *d >= as_of)
        .collect();
    dated.sort_by_key(|(d, e)| (*d, e.id));
    dated.into_iter().take(limit).map(|(_, e)| e.clone()).collect()
}

pub fn upcoming(store: &mut Store, as_of: NaiveDate, limit: usize) -> Vec<SchoolEvent> {
    upcoming_from(&EVENTS.get(store), as_of, limit)
}
