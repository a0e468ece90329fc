mod common;

use common::spawn_sidecar;
use serde_json::{json, Value};

fn amounts(p: &Value) -> (f64, f64) {
    (
        p["amountPaid"].as_f64().expect("amountPaid"),
        p["balanceDue"].as_f64().expect("balanceDue"),
    )
}

#[test]
fn status_cycle_rewrites_amounts() {
    let mut sc = spawn_sidecar();
    sc.request_ok("students.register", json!({ "name": "Kofi Mensah" }));

    let created = sc.request_ok(
        "payments.create",
        json!({ "studentId": 1, "totalFees": 1000, "amountPaid": 400, "asOf": "2026-03-01" }),
    );
    let id = created["id"].as_i64().expect("payment id");
    assert_eq!(created["status"], "Pending");
    assert_eq!(created["rollNo"], "2024001");
    assert_eq!(created["student"], "Kofi Mensah");
    assert_eq!(created["lastPayment"], "2026-03-01");
    assert_eq!(amounts(&created), (400.0, 600.0));

    let overdue = sc.request_ok("payments.cycleStatus", json!({ "id": id }));
    assert_eq!(overdue["status"], "Overdue");
    assert_eq!(amounts(&overdue), (400.0, 600.0));

    let paid = sc.request_ok("payments.cycleStatus", json!({ "id": id }));
    assert_eq!(paid["status"], "Paid");
    assert_eq!(amounts(&paid), (1000.0, 0.0));

    let pending = sc.request_ok("payments.cycleStatus", json!({ "id": id }));
    assert_eq!(pending["status"], "Pending");
    assert_eq!(amounts(&pending), (500.0, 500.0));

    sc.request_ok(
        "setup.update",
        json!({ "section": "fees", "patch": { "resetPaidPercent": 20 } }),
    );
    sc.request_ok("payments.cycleStatus", json!({ "id": id }));
    sc.request_ok("payments.cycleStatus", json!({ "id": id }));
    let reset = sc.request_ok("payments.cycleStatus", json!({ "id": id }));
    assert_eq!(amounts(&reset), (200.0, 800.0));

    sc.request_err("payments.cycleStatus", json!({ "id": 99 }), "not_found");
    sc.shutdown();
}

#[test]
fn payments_require_a_registered_student() {
    let mut sc = spawn_sidecar();
    let err = sc.request_err(
        "payments.create",
        json!({ "rollNo": "2024999", "totalFees": 100 }),
        "bad_params",
    );
    assert_eq!(err["message"], "Select a registered student to record payments.");
    sc.request_err("payments.create", json!({ "totalFees": 100 }), "bad_params");

    sc.request_ok("students.register", json!({ "name": "Ama Owusu" }));
    let by_roll = sc.request_ok(
        "payments.create",
        json!({ "rollNo": "2024001", "totalFees": 300, "amountPaid": 900 }),
    );
    assert_eq!(by_roll["studentId"], 1);
    // Overpayment is capped at the total.
    assert_eq!(amounts(&by_roll), (300.0, 0.0));
    sc.shutdown();
}

#[test]
fn summary_splits_balances_by_status() {
    let mut sc = spawn_sidecar();
    sc.request_ok("students.register", json!({ "name": "Kofi", "grade": "Grade 9" }));
    sc.request_ok("students.register", json!({ "name": "Ama", "grade": "Grade 10" }));

    let a = sc.request_ok(
        "payments.create",
        json!({ "studentId": 1, "totalFees": 1000, "amountPaid": 400, "method": "Cash", "asOf": "2026-03-02" }),
    );
    sc.request_ok(
        "payments.create",
        json!({ "studentId": 2, "totalFees": 500, "amountPaid": 100, "method": "Card", "asOf": "2026-02-10" }),
    );
    sc.request_ok("payments.cycleStatus", json!({ "id": a["id"] }));

    let summary = sc.request_ok("payments.summary", json!({ "asOf": "2026-03-12" }));
    assert_eq!(summary["totalCollected"].as_f64(), Some(500.0));
    assert_eq!(summary["pendingBalance"].as_f64(), Some(400.0));
    assert_eq!(summary["overdueBalance"].as_f64(), Some(600.0));
    assert_eq!(summary["collectedThisMonth"].as_f64(), Some(400.0));

    let alerts = summary["overdueAlerts"].as_array().expect("alerts");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["daysOverdue"], 10);

    let overall = &summary["collection"]["overall"];
    assert_eq!(overall["rate"], 33);
    let rows = summary["collection"]["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["grade"], "Grade 10");
    assert_eq!(rows[0]["rate"], 20);

    let only_grade_9 = sc.request_ok("payments.list", json!({ "grade": "Grade 9" }));
    assert_eq!(only_grade_9.as_array().map(|a| a.len()), Some(1));

    let recorded = sc.request_ok("payments.record", json!({ "id": 2, "asOf": "2026-03-12" }));
    assert_eq!(recorded["status"], "Paid");
    assert_eq!(recorded["lastPayment"], "2026-03-12");
    sc.shutdown();
}
