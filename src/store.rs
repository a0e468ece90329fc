//! Persisted state cells.
//!
//! A [`Store`] binds in-memory values to a [`Storage`] backend. Reads fall back
//! to a default when a key is absent or unreadable; writes go through to the
//! backend synchronously and notify every listener on that key before
//! returning. Storage write failures are logged and swallowed, so memory and
//! storage can diverge; diverged keys are tracked and reported by
//! [`Store::status`].
//!
//! One writer per storage is assumed. Two stores sharing a backend overwrite
//! each other with last-write-wins semantics.

use crate::storage::Storage;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const ENVELOPE_VERSION: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written to memory and storage.
    Persisted,
    /// Identical to the current value; nothing written, nobody notified.
    Unchanged,
    /// Storage rejected the write; only the in-memory value changed.
    MemoryOnly,
    /// The value could not be serialized; nothing changed.
    Dropped,
}

pub type ListenerId = Uuid;
type Listener = Box<dyn FnMut(&str, &Value)>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub backend: &'static str,
    pub keys: Vec<String>,
    pub diverged_keys: Vec<String>,
}

enum Decoded {
    Current(Value),
    Legacy(Value),
    Invalid,
}

fn decode_stored(raw: &str) -> Decoded {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return Decoded::Invalid;
    };
    match value {
        Value::Object(mut obj)
            if obj.len() == 2 && obj.contains_key("version") && obj.contains_key("data") =>
        {
            match obj.get("version").and_then(|v| v.as_u64()) {
                Some(v) if v <= ENVELOPE_VERSION => {
                    Decoded::Current(obj.remove("data").unwrap_or(Value::Null))
                }
                _ => Decoded::Invalid,
            }
        }
        other => Decoded::Legacy(other),
    }
}

fn envelope(data: &Value) -> Value {
    json!({ "version": ENVELOPE_VERSION, "data": data })
}

pub struct Store {
    backend: Box<dyn Storage>,
    memory: HashMap<String, String>,
    diverged: BTreeSet<String>,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
}

impl Store {
    pub fn new(backend: Box<dyn Storage>) -> Self {
        Self {
            backend,
            memory: HashMap::new(),
            diverged: BTreeSet::new(),
            listeners: HashMap::new(),
        }
    }

    pub fn get<T, F>(&mut self, key: &str, default: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(serialized) = self.memory.get(key) {
            match serde_json::from_str::<T>(serialized) {
                Ok(v) => return v,
                Err(e) => {
                    warn!(key, error = %e, "in-memory value has an unexpected shape, using default");
                }
            }
            let value = default();
            self.set(key, &value);
            return value;
        }

        let stored = match self.backend.get(key) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "storage read failed, using default");
                None
            }
        };

        if let Some(raw) = stored {
            match decode_stored(&raw) {
                Decoded::Current(data) => match serde_json::from_value::<T>(data) {
                    Ok(v) => {
                        if let Ok(serialized) = serde_json::to_string(&v) {
                            self.memory.insert(key.to_string(), serialized);
                        }
                        return v;
                    }
                    Err(e) => warn!(key, error = %e, "stored value is invalid, replacing with default"),
                },
                Decoded::Legacy(data) => match serde_json::from_value::<T>(data) {
                    Ok(v) => {
                        info!(key, "upgrading unversioned value to envelope v{}", ENVELOPE_VERSION);
                        self.set(key, &v);
                        return v;
                    }
                    Err(e) => warn!(key, error = %e, "stored value is invalid, replacing with default"),
                },
                Decoded::Invalid => {
                    warn!(key, "stored value is unreadable, replacing with default");
                }
            }
        }

        let value = default();
        self.set(key, &value);
        value
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> WriteOutcome {
        let data = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "value could not be serialized, write dropped");
                return WriteOutcome::Dropped;
            }
        };
        let serialized = data.to_string();
        if self.memory.get(key) == Some(&serialized) && !self.diverged.contains(key) {
            return WriteOutcome::Unchanged;
        }
        self.memory.insert(key.to_string(), serialized);

        let outcome = match self.backend.set(key, &envelope(&data).to_string()) {
            Ok(()) => {
                self.diverged.remove(key);
                WriteOutcome::Persisted
            }
            Err(e) => {
                warn!(key, error = %e, "storage write failed, keeping in-memory value only");
                self.diverged.insert(key.to_string());
                WriteOutcome::MemoryOnly
            }
        };
        debug!(key, ?outcome, "store write");
        self.notify(key, &data);
        outcome
    }

    /// Drops a key from memory and storage; the next read restores its default.
    pub fn remove(&mut self, key: &str) {
        self.memory.remove(key);
        self.diverged.remove(key);
        if let Err(e) = self.backend.remove(key) {
            warn!(key, error = %e, "storage remove failed");
        }
    }

    pub fn subscribe<F>(&mut self, key: &str, listener: F) -> ListenerId
    where
        F: FnMut(&str, &Value) + 'static,
    {
        let id = Uuid::new_v4();
        self.listeners
            .entry(key.to_string())
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, key: &str, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        before != list.len()
    }

    fn notify(&mut self, key: &str, data: &Value) {
        if let Some(list) = self.listeners.get_mut(key) {
            for (_, listener) in list.iter_mut() {
                listener(key, data);
            }
        }
    }

    /// Current data for a key without a default: memory first, then storage.
    pub fn peek(&self, key: &str) -> Option<Value> {
        if let Some(serialized) = self.memory.get(key) {
            return serde_json::from_str(serialized).ok();
        }
        let raw = self.backend.get(key).ok().flatten()?;
        match decode_stored(&raw) {
            Decoded::Current(v) | Decoded::Legacy(v) => Some(v),
            Decoded::Invalid => None,
        }
    }

    pub fn status(&self) -> StoreStatus {
        let mut keys: BTreeSet<String> = self.memory.keys().cloned().collect();
        match self.backend.keys() {
            Ok(stored) => keys.extend(stored),
            Err(e) => warn!(error = %e, "storage key listing failed"),
        }
        StoreStatus {
            backend: self.backend.backend_name(),
            keys: keys.into_iter().collect(),
            diverged_keys: self.diverged.iter().cloned().collect(),
        }
    }

    /// Every key as a v1 envelope, reflecting what this process currently sees.
    pub fn snapshot(&self) -> anyhow::Result<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        for key in self.backend.keys().context("failed to list storage keys")? {
            if let Some(data) = self.peek(&key) {
                out.insert(key, envelope(&data));
            }
        }
        for key in self.memory.keys() {
            if !out.contains_key(key) {
                if let Some(data) = self.peek(key) {
                    out.insert(key.clone(), envelope(&data));
                }
            }
        }
        Ok(out)
    }

    /// Replaces every key with the snapshot contents. All or nothing: when
    /// the backend rejects a write, storage is rolled back and memory is left
    /// as it was.
    pub fn restore(&mut self, snapshot: &BTreeMap<String, Value>) -> anyhow::Result<()> {
        let entries: BTreeMap<String, String> = snapshot
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect();
        if let Err(e) = self.backend.replace_all(&entries) {
            warn!(error = %e, "snapshot restore rejected, previous contents kept");
            return Err(e).context("failed to restore snapshot");
        }
        self.memory.clear();
        self.diverged.clear();
        let keys: Vec<String> = self.listeners.keys().cloned().collect();
        for key in keys {
            if let Some(data) = self.peek(&key) {
                self.notify(&key, &data);
            }
        }
        info!(keys = snapshot.len(), "store restored from snapshot");
        Ok(())
    }
}

/// A typed `(key, default)` binding onto a [`Store`].
pub struct PersistedCell<T> {
    key: &'static str,
    default: fn() -> T,
}

impl<T> PersistedCell<T> {
    pub const fn new(key: &'static str, default: fn() -> T) -> Self {
        Self { key, default }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }
}

impl<T: Serialize + DeserializeOwned> PersistedCell<T> {
    pub fn get(&self, store: &mut Store) -> T {
        store.get(self.key, self.default)
    }

    pub fn set(&self, store: &mut Store, value: &T) -> WriteOutcome {
        store.set(self.key, value)
    }

    /// Copy-on-write mutation: read the whole value, change it, write it back.
    pub fn update<R>(&self, store: &mut Store, f: impl FnOnce(&mut T) -> R) -> R {
        let mut value = self.get(store);
        let out = f(&mut value);
        self.set(store, &value);
        out
    }

    /// Like [`PersistedCell::update`], but nothing is written when `f` fails.
    pub fn try_update<R, E>(
        &self,
        store: &mut Store,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut value = self.get(store);
        let out = f(&mut value)?;
        self.set(store, &value);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde::Deserialize;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: i64,
        name: String,
    }

    const ROWS: PersistedCell<Vec<Row>> = PersistedCell::new("test.rows", Vec::new);

    fn rows(n: i64) -> Vec<Row> {
        (1..=n)
            .rev()
            .map(|id| Row {
                id,
                name: format!("row {}", id),
            })
            .collect()
    }

    #[test]
    fn absent_key_writes_default_to_storage() {
        let backing = MemoryStorage::new();
        let mut store = Store::new(Box::new(backing.shared()));
        assert_eq!(ROWS.get(&mut store), Vec::<Row>::new());
        let raw = backing.get("test.rows").expect("get").expect("default written");
        let stored: Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(stored, json!({ "version": 1, "data": [] }));
    }

    #[test]
    fn write_then_read_from_fresh_store_preserves_order_and_fields() {
        let backing = MemoryStorage::new();
        let mut writer = Store::new(Box::new(backing.shared()));
        let value = rows(5);
        assert_eq!(ROWS.set(&mut writer, &value), WriteOutcome::Persisted);

        let mut reader = Store::new(Box::new(backing.shared()));
        assert_eq!(ROWS.get(&mut reader), value);
    }

    #[test]
    fn unparseable_data_is_replaced_by_default() {
        let mut backing = MemoryStorage::new();
        backing.set("test.rows", "{not json").expect("seed");
        let mut store = Store::new(Box::new(backing.shared()));
        assert!(ROWS.get(&mut store).is_empty());
        let raw = backing.get("test.rows").expect("get").expect("present");
        let stored: Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(stored, json!({ "version": 1, "data": [] }));
    }

    #[test]
    fn unversioned_data_is_upgraded_into_an_envelope() {
        let mut backing = MemoryStorage::new();
        backing
            .set("test.rows", r#"[{"id":7,"name":"legacy"}]"#)
            .expect("seed");
        let mut store = Store::new(Box::new(backing.shared()));
        let got = ROWS.get(&mut store);
        assert_eq!(got, vec![Row { id: 7, name: "legacy".into() }]);
        let raw = backing.get("test.rows").expect("get").expect("present");
        assert!(raw.contains(r#""version":1"#));
    }

    #[test]
    fn newer_envelope_version_is_treated_as_absent() {
        let mut backing = MemoryStorage::new();
        backing
            .set("test.rows", r#"{"version":99,"data":[{"id":1,"name":"x"}]}"#)
            .expect("seed");
        let mut store = Store::new(Box::new(backing.shared()));
        assert!(ROWS.get(&mut store).is_empty());
    }

    #[test]
    fn quota_failure_keeps_memory_and_marks_key_diverged() {
        let mut store = Store::new(Box::new(MemoryStorage::with_quota(64)));
        let big = rows(20);
        assert_eq!(ROWS.set(&mut store, &big), WriteOutcome::MemoryOnly);
        assert_eq!(ROWS.get(&mut store), big);
        assert_eq!(store.status().diverged_keys, vec!["test.rows".to_string()]);
        assert_eq!(store.peek("test.rows"), Some(serde_json::to_value(&big).expect("value")));
    }

    #[test]
    fn identical_write_is_skipped_and_not_notified() {
        let mut store = Store::new(Box::new(MemoryStorage::new()));
        let seen = Rc::new(RefCell::new(0));
        let counter = seen.clone();
        store.subscribe("test.rows", move |_, _| *counter.borrow_mut() += 1);

        assert_eq!(ROWS.set(&mut store, &rows(2)), WriteOutcome::Persisted);
        assert_eq!(ROWS.set(&mut store, &rows(2)), WriteOutcome::Unchanged);
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn listeners_observe_writes_before_set_returns() {
        let mut store = Store::new(Box::new(MemoryStorage::new()));
        let seen: Rc<RefCell<Vec<Value>>> = Rc::default();
        let sink = seen.clone();
        let id = store.subscribe("test.rows", move |_, v| sink.borrow_mut().push(v.clone()));

        ROWS.update(&mut store, |r| r.push(Row { id: 1, name: "a".into() }));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0], json!([{ "id": 1, "name": "a" }]));

        assert!(store.unsubscribe("test.rows", id));
        ROWS.update(&mut store, |r| r.clear());
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn failed_try_update_writes_nothing() {
        let mut store = Store::new(Box::new(MemoryStorage::new()));
        ROWS.set(&mut store, &rows(1));
        let res: Result<(), &str> = ROWS.try_update(&mut store, |r| {
            r.clear();
            Err("rejected")
        });
        assert!(res.is_err());
        assert_eq!(ROWS.get(&mut store).len(), 1);
    }

    #[test]
    fn two_stores_on_one_storage_are_last_write_wins() {
        let backing = MemoryStorage::new();
        let mut tab_a = Store::new(Box::new(backing.shared()));
        let mut tab_b = Store::new(Box::new(backing.shared()));
        ROWS.set(&mut tab_a, &rows(1));
        ROWS.set(&mut tab_b, &rows(3));

        let mut fresh = Store::new(Box::new(backing.shared()));
        assert_eq!(ROWS.get(&mut fresh).len(), 3);
        // tab_a still holds its own in-memory copy
        assert_eq!(ROWS.get(&mut tab_a).len(), 1);
    }

    #[test]
    fn snapshot_and_restore_roundtrip() {
        let mut src = Store::new(Box::new(MemoryStorage::new()));
        ROWS.set(&mut src, &rows(3));
        src.set("test.other", &json!({ "a": 1 }));
        let snap = src.snapshot().expect("snapshot");
        assert_eq!(snap.len(), 2);

        let mut dst = Store::new(Box::new(MemoryStorage::new()));
        dst.set("test.stale", &1);
        dst.restore(&snap).expect("restore");
        assert_eq!(ROWS.get(&mut dst), rows(3));
        assert!(dst.peek("test.stale").is_none());
    }

    #[test]
    fn failed_restore_keeps_previous_contents() {
        let backing = MemoryStorage::with_quota(200);
        let mut store = Store::new(Box::new(backing.shared()));
        let students = json!([{ "id": 1, "name": "Kofi" }]);
        assert_eq!(store.set("school.students", &students), WriteOutcome::Persisted);

        let snapshot = BTreeMap::from([
            ("school.events".to_string(), envelope(&json!([]))),
            ("school.students".to_string(), envelope(&json!("x".repeat(300)))),
        ]);
        assert!(store.restore(&snapshot).is_err());

        assert_eq!(store.peek("school.students"), Some(students.clone()));
        assert!(store.peek("school.events").is_none());
        let fresh = Store::new(Box::new(backing.shared()));
        assert_eq!(fresh.peek("school.students"), Some(students));
        assert_eq!(fresh.status().keys, vec!["school.students".to_string()]);
    }
}
