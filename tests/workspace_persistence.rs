mod common;

use common::{spawn_sidecar, spawn_sidecar_with_env, temp_dir};
use serde_json::json;

#[test]
fn sqlite_workspace_survives_restart() {
    let workspace = temp_dir("schoold-persist");
    let path = workspace.to_string_lossy().to_string();

    let mut sc = spawn_sidecar();
    let selected = sc.request_ok("workspace.select", json!({ "path": path }));
    assert_eq!(selected["workspacePath"], path.as_str());
    assert_eq!(sc.request_ok("store.status", json!({}))["backend"], "sqlite");
    sc.request_ok("students.register", json!({ "name": "Kofi Mensah" }));
    sc.request_ok(
        "setup.update",
        json!({ "section": "attendance", "patch": { "absentMarker": "A" } }),
    );
    sc.shutdown();

    let mut sc = spawn_sidecar_with_env(&[("SCHOOLD_WORKSPACE", path.as_str())]);
    let health = sc.request_ok("health", json!({}));
    assert_eq!(health["backend"], "sqlite");
    let students = sc.request_ok("students.list", json!({}));
    assert_eq!(students[0]["rollNumber"], "2024001");
    let attendance = sc.request_ok("setup.get", json!({ "section": "attendance" }));
    assert_eq!(attendance["absentMarker"], "a");

    let stored = sc.request_ok("store.get", json!({ "key": "school.students" }));
    assert_eq!(stored["value"][0]["name"], "Kofi Mensah");

    sc.request_ok("workspace.memory", json!({}));
    assert_eq!(
        sc.request_ok("students.list", json!({})).as_array().map(|a| a.len()),
        Some(0)
    );
    sc.shutdown();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn store_reset_and_setup_validation() {
    let mut sc = spawn_sidecar();
    sc.request_ok("students.register", json!({ "name": "Kofi" }));
    sc.request_ok("events.create", json!({ "title": "PTA", "date": "2026-03-20" }));

    let status = sc.request_ok("store.status", json!({}));
    assert_eq!(status["backend"], "memory");
    let keys: Vec<&str> = status["keys"]
        .as_array()
        .expect("keys")
        .iter()
        .filter_map(|k| k.as_str())
        .collect();
    assert!(keys.contains(&"school.students"), "{keys:?}");
    assert!(keys.contains(&"school.events"), "{keys:?}");

    sc.request_ok("store.reset", json!({ "key": "school.events" }));
    assert_eq!(
        sc.request_ok("events.list", json!({})).as_array().map(|a| a.len()),
        Some(0)
    );
    sc.request_ok("store.reset", json!({}));
    assert_eq!(
        sc.request_ok("students.list", json!({})).as_array().map(|a| a.len()),
        Some(0)
    );

    let unknown = sc.request_err(
        "setup.update",
        json!({ "section": "fees", "patch": { "lateFee": 5 } }),
        "bad_params",
    );
    assert_eq!(unknown["message"], "unknown fees field: lateFee");
    sc.request_err(
        "setup.update",
        json!({ "section": "fees", "patch": { "resetPaidPercent": 150 } }),
        "bad_params",
    );
    sc.request_err("setup.get", json!({ "section": "library" }), "bad_params");

    let all = sc.request_ok("setup.get", json!({}));
    assert_eq!(all["fees"]["resetPaidPercent"], 50);
    assert_eq!(all["registration"]["rollPrefix"], "2024");
    sc.shutdown();
}

#[test]
fn backup_bundle_round_trips_between_sidecars() {
    let dir = temp_dir("schoold-backup");
    let bundle = dir.join("school.zip");
    let bundle_path = bundle.to_string_lossy().to_string();

    let mut source = spawn_sidecar();
    source.request_ok("students.register", json!({ "name": "Kofi" }));
    source.request_ok(
        "profile.update",
        json!({ "name": "Hilltop Academy", "schoolId": "SCH-1" }),
    );
    let exported = source.request_ok("backup.export", json!({ "outPath": bundle_path }));
    assert_eq!(exported["bundleFormat"], "schoold-store-v1");
    assert_eq!(exported["keyCount"], 2);
    source.shutdown();

    let mut target = spawn_sidecar();
    target.request_ok("events.create", json!({ "title": "Stale", "date": "2026-01-01" }));
    let imported = target.request_ok("backup.import", json!({ "inPath": bundle_path }));
    assert_eq!(imported["bundleId"], exported["bundleId"]);
    assert_eq!(imported["keyCount"], 2);

    assert_eq!(target.request_ok("profile.get", json!({}))["name"], "Hilltop Academy");
    assert_eq!(target.request_ok("students.list", json!({}))[0]["name"], "Kofi");
    assert_eq!(
        target.request_ok("events.list", json!({})).as_array().map(|a| a.len()),
        Some(0)
    );

    target.request_err(
        "backup.import",
        json!({ "inPath": dir.join("missing.zip").to_string_lossy() }),
        "not_found",
    );
    let junk = dir.join("junk.zip");
    std::fs::write(&junk, b"not a zip").expect("write junk");
    target.request_err(
        "backup.import",
        json!({ "inPath": junk.to_string_lossy() }),
        "bad_bundle",
    );
    target.request_err("backup.export", json!({}), "bad_params");
    target.shutdown();
    let _ = std::fs::remove_dir_all(dir);
}
