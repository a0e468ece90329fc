mod common;

use common::{spawn_sidecar, temp_dir};
use serde_json::json;

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let out_dir = temp_dir("schoold-router-smoke");
    let bundle = out_dir.join("smoke.zip");
    let mut sc = spawn_sidecar();

    let calls = vec![
        ("health", json!({})),
        ("store.status", json!({})),
        ("session.get", json!({})),
        ("profile.get", json!({})),
        ("setup.get", json!({})),
        ("students.list", json!({})),
        ("teachers.list", json!({})),
        ("classes.list", json!({})),
        ("assignments.list", json!({})),
        ("parents.list", json!({})),
        ("payments.list", json!({})),
        ("payments.summary", json!({ "asOf": "2026-03-15" })),
        ("results.list", json!({})),
        ("results.summary", json!({})),
        ("attendance.list", json!({})),
        ("attendance.rate", json!({ "asOf": "2026-03-15" })),
        ("events.list", json!({})),
        ("events.upcoming", json!({ "asOf": "2026-03-15", "limit": 3 })),
        ("documents.list", json!({})),
        ("documents.summary", json!({})),
        ("documents.folders", json!({})),
        ("documents.reads", json!({ "role": "student" })),
        ("threads.list", json!({ "role": "admin" })),
        ("threads.stats", json!({ "role": "teacher" })),
        ("notifications.list", json!({})),
        ("dashboard.admin", json!({ "asOf": "2026-03-15" })),
        ("dashboard.teacher", json!({ "asOf": "2026-03-15" })),
        ("backup.export", json!({ "outPath": bundle.to_string_lossy() })),
    ];
    for (method, params) in calls {
        sc.request_ok(method, params);
    }

    let unknown = sc.request_err("grades.explode", json!({}), "not_implemented");
    assert!(unknown["message"]
        .as_str()
        .unwrap_or_default()
        .contains("grades.explode"));

    sc.shutdown();
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn health_reports_memory_backend_without_workspace() {
    let mut sc = spawn_sidecar();
    let health = sc.request_ok("health", json!({}));
    assert_eq!(health["backend"], "memory");
    assert!(health["workspacePath"].is_null());
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    sc.shutdown();
}

#[test]
fn malformed_params_are_bad_params() {
    let mut sc = spawn_sidecar();
    sc.request_err("students.delete", json!({}), "bad_params");
    sc.request_err("payments.create", json!({ "totalFees": "lots" }), "bad_params");
    sc.request_err("threads.list", json!({ "role": "janitor" }), "bad_params");
    sc.request_err("events.upcoming", json!({ "asOf": "tomorrow" }), "bad_params");
    sc.shutdown();
}
