//! Summary numbers for dashboards and reports.
//!
//! Every reducer has a defined value for empty input: 0 for rates and
//! totals, `None` where the UI shows `--`, and empty lists otherwise.

use crate::model::{
    AttendanceRecord, MessageEntry, MessageThread, Payment, PaymentStatus, ResultRow, Role,
    Student, TeacherClass,
};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const GRADE_LABELS: [&str; 5] = ["A+", "A", "B", "C", "D"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    /// Exclusive. `None` leaves the window open-ended.
    pub end: Option<NaiveDate>,
}

impl Window {
    pub fn trailing(as_of: NaiveDate, days: i64) -> Self {
        Self {
            start: as_of - Duration::days(days),
            end: None,
        }
    }

    /// The `days`-long window immediately before [`Window::trailing`].
    pub fn previous(as_of: NaiveDate, days: i64) -> Self {
        Self {
            start: as_of - Duration::days(days * 2),
            end: Some(as_of - Duration::days(days)),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.map(|end| date < end).unwrap_or(true)
    }
}

/// Accepts `YYYY-MM-DD` with or without a trailing time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub fn rate_percent(part: f64, whole: f64) -> i64 {
    if whole <= 0.0 {
        return 0;
    }
    (part / whole * 100.0).round() as i64
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Per-student sessions: one per linked student with a recorded status on a
/// record for their grade and section.
pub fn student_attendance_rate(
    records: &[AttendanceRecord],
    students: &[Student],
    window: Window,
    absent_marker: &str,
) -> i64 {
    let mut present = 0u32;
    let mut total = 0u32;
    for record in records {
        let Some(date) = parse_date(&record.date_iso) else {
            continue;
        };
        if !window.contains(date) {
            continue;
        }
        for student in students {
            if student.grade != record.grade || student.section != record.section {
                continue;
            }
            let Some(status) = record.attendance.get(&student.id) else {
                continue;
            };
            if status.is_empty() {
                continue;
            }
            total += 1;
            // Any status other than the marker counts as present.
            if status != absent_marker {
                present += 1;
            }
        }
    }
    rate_percent(present as f64, total as f64)
}

/// Sessions on records for any of `classes`. Statuses are re-read against
/// the current marker; the stored counts are used only for records that
/// carry no per-student statuses.
pub fn class_attendance_rate(
    records: &[AttendanceRecord],
    classes: &[TeacherClass],
    window: Window,
    absent_marker: &str,
) -> i64 {
    let mut present = 0u64;
    let mut total = 0u64;
    for record in records {
        let Some(date) = parse_date(&record.date_iso) else {
            continue;
        };
        if !window.contains(date) {
            continue;
        }
        if !classes
            .iter()
            .any(|c| c.grade == record.grade && c.section == record.section)
        {
            continue;
        }
        if record.attendance.is_empty() {
            present += record.present as u64;
            total += (record.present + record.absent) as u64;
            continue;
        }
        for status in record.attendance.values().filter(|s| !s.is_empty()) {
            total += 1;
            if status != absent_marker {
                present += 1;
            }
        }
    }
    rate_percent(present as f64, total as f64)
}

/// Records for the student's grade and section that carry a non-blank
/// status for them, newest first.
pub fn student_sessions<'a>(
    records: &'a [AttendanceRecord],
    student: &Student,
) -> Vec<&'a AttendanceRecord> {
    let mut out: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| r.grade == student.grade && r.section == student.section)
        .filter(|r| {
            r.attendance
                .get(&student.id)
                .map(|s| !s.is_empty())
                .unwrap_or(false)
        })
        .collect();
    out.sort_by(|a, b| b.date_iso.cmp(&a.date_iso));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub present: usize,
    pub total: usize,
    pub rate: i64,
    /// Rate over the latest five sessions minus the rate over the five before.
    pub delta: i64,
}

/// `sessions` must come from [`student_sessions`] for the same student.
pub fn session_stats(
    sessions: &[&AttendanceRecord],
    student_id: i64,
    absent_marker: &str,
) -> SessionStats {
    let present_in = |chunk: &[&AttendanceRecord]| {
        chunk
            .iter()
            .filter(|r| {
                r.attendance
                    .get(&student_id)
                    .map(|s| s != absent_marker)
                    .unwrap_or(false)
            })
            .count()
    };
    let rate_of = |chunk: &[&AttendanceRecord]| {
        rate_percent(present_in(chunk) as f64, chunk.len() as f64)
    };
    let split = sessions.len().min(5);
    let recent = &sessions[..split];
    let previous = &sessions[split..sessions.len().min(10)];
    let present = present_in(sessions);
    SessionStats {
        present,
        total: sessions.len(),
        rate: rate_percent(present as f64, sessions.len() as f64),
        delta: rate_of(recent) - rate_of(previous),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTrend {
    pub count: usize,
    pub average: f64,
    /// Mean of the latest three results minus the mean of the three before.
    pub delta: f64,
}

pub fn score_trend(results: &[&ResultRow]) -> ScoreTrend {
    let mean = |rows: &[&ResultRow]| {
        rows.iter().map(|r| r.percentage).sum::<f64>() / rows.len().max(1) as f64
    };
    let mut newest: Vec<&ResultRow> = results.to_vec();
    newest.sort_by(|a, b| b.id.cmp(&a.id));
    let split = newest.len().min(3);
    let recent = &newest[..split];
    let previous = &newest[split..newest.len().min(6)];
    ScoreTrend {
        count: results.len(),
        average: round1(mean(results)),
        delta: round1(mean(recent) - mean(previous)),
    }
}

/// Balance due on rows last paid in `as_of`'s month, minus the same for the
/// month before, rounded to whole units.
pub fn outstanding_month_delta(payments: &[&Payment], as_of: NaiveDate) -> f64 {
    let this_month = as_of.format("%Y-%m").to_string();
    let last_month = as_of
        .with_day(1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_default();
    let due_in = |month: &str| -> f64 {
        payments
            .iter()
            .filter(|p| !month.is_empty() && p.last_payment.starts_with(month))
            .map(|p| p.balance_due)
            .sum()
    };
    (due_in(&this_month) - due_in(&last_month)).round()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub rate: i64,
    pub previous: i64,
    pub delta: i64,
}

impl Trend {
    pub fn new(rate: i64, previous: i64) -> Self {
        Self {
            rate,
            previous,
            delta: rate - previous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRow {
    pub grade: String,
    pub collected: f64,
    pub total: f64,
    pub rate: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub rows: Vec<CollectionRow>,
    pub overall: CollectionRow,
}

/// Per-grade collection rates plus an overall row built from the raw sums,
/// not from the rounded per-grade rates.
pub fn collection_report(payments: &[&Payment]) -> CollectionReport {
    let mut by_grade: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    let mut collected = 0.0;
    let mut total = 0.0;
    for p in payments {
        let entry = by_grade.entry(p.grade.as_str()).or_insert((0.0, 0.0));
        entry.0 += p.amount_paid;
        entry.1 += p.total_fees;
        collected += p.amount_paid;
        total += p.total_fees;
    }
    CollectionReport {
        rows: by_grade
            .into_iter()
            .map(|(grade, (c, t))| CollectionRow {
                grade: grade.to_string(),
                collected: c,
                total: t,
                rate: rate_percent(c, t),
            })
            .collect(),
        overall: CollectionRow {
            grade: "Overall".to_string(),
            collected,
            total,
            rate: rate_percent(collected, total),
        },
    }
}

pub fn overall_collection_rate(payments: &[Payment]) -> i64 {
    let (c, t) = payments
        .iter()
        .fold((0.0, 0.0), |(c, t), p| (c + p.amount_paid, t + p.total_fees));
    rate_percent(c, t)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeBucket {
    pub grade: &'static str,
    pub count: usize,
}

/// Counts the stored `grade` labels; percentages are not re-banded.
pub fn grade_distribution<'a>(results: impl IntoIterator<Item = &'a ResultRow>) -> Vec<GradeBucket> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in results {
        *counts.entry(r.grade.as_str()).or_default() += 1;
    }
    GRADE_LABELS
        .iter()
        .map(|&label| GradeBucket {
            grade: label,
            count: counts.get(label).copied().unwrap_or(0),
        })
        .collect()
}

pub fn compute_grade(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "A+"
    } else if percentage >= 80.0 {
        "A"
    } else if percentage >= 70.0 {
        "B"
    } else if percentage >= 60.0 {
        "C"
    } else {
        "D"
    }
}

pub fn remarks(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "Excellent"
    } else if percentage >= 80.0 {
        "Strong performance"
    } else if percentage >= 70.0 {
        "Satisfactory"
    } else if percentage >= 60.0 {
        "Average"
    } else {
        "Needs improvement"
    }
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

/// Mean of the four subject scores, one decimal.
pub fn percentage(math: f64, english: f64, science: f64, history: f64) -> f64 {
    round1((math + english + science + history) / 4.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverages {
    pub mathematics: f64,
    pub english: f64,
    pub science: f64,
    pub history: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub count: usize,
    pub average_percentage: f64,
    pub top_student: Option<ResultRow>,
    pub pass_rate: f64,
    pub subject_averages: SubjectAverages,
    pub distribution: Vec<GradeBucket>,
    pub top_performers: Vec<ResultRow>,
    pub needs_support: Vec<ResultRow>,
}

pub fn results_summary(results: &[&ResultRow], pass_mark: f64) -> ResultsSummary {
    let n = results.len();
    let denom = n.max(1) as f64;
    let mean = |f: fn(&ResultRow) -> f64| round1(results.iter().map(|r| f(r)).sum::<f64>() / denom);

    let mut ranked: Vec<ResultRow> = results.iter().map(|r| (*r).clone()).collect();
    // Stable sort keeps insertion order among ties.
    ranked.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    let top_student = results
        .iter()
        .fold(None::<&ResultRow>, |top, r| match top {
            Some(t) if r.percentage <= t.percentage => Some(t),
            _ => Some(*r),
        })
        .cloned();
    let mut ascending: Vec<ResultRow> = results.iter().map(|r| (*r).clone()).collect();
    ascending.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));

    let passed = results.iter().filter(|r| r.percentage >= pass_mark).count();
    ResultsSummary {
        count: n,
        average_percentage: mean(|r| r.percentage),
        top_student,
        pass_rate: round1(passed as f64 / denom * 100.0),
        subject_averages: SubjectAverages {
            mathematics: mean(|r| r.math),
            english: mean(|r| r.english),
            science: mean(|r| r.science),
            history: mean(|r| r.history),
        },
        distribution: grade_distribution(results.iter().copied()),
        top_performers: ranked.into_iter().take(3).collect(),
        needs_support: ascending.into_iter().take(2).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodShare {
    pub method: String,
    pub amount: f64,
    pub percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueAlert {
    pub payment_id: i64,
    pub student: String,
    pub roll_no: String,
    pub balance_due: f64,
    /// `None` when `lastPayment` is not a date.
    pub days_overdue: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub total_collected: f64,
    pub pending_balance: f64,
    pub overdue_balance: f64,
    pub collected_this_month: f64,
    pub methods: Vec<MethodShare>,
    pub overdue_alerts: Vec<OverdueAlert>,
    pub collection: CollectionReport,
}

pub fn fee_summary(payments: &[&Payment], as_of: NaiveDate) -> FeeSummary {
    let month = as_of.format("%Y-%m").to_string();
    let balance_with = |status: PaymentStatus| -> f64 {
        payments
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.balance_due)
            .sum()
    };

    let mut method_totals: Vec<(String, f64)> = Vec::new();
    for p in payments {
        let method = if p.method.trim().is_empty() {
            "Unspecified".to_string()
        } else {
            p.method.clone()
        };
        match method_totals.iter_mut().find(|(m, _)| *m == method) {
            Some((_, amount)) => *amount += p.amount_paid,
            None => method_totals.push((method, p.amount_paid)),
        }
    }
    let method_sum: f64 = method_totals.iter().map(|(_, a)| a).sum();

    let overdue_alerts = payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Overdue)
        .map(|p| OverdueAlert {
            payment_id: p.id,
            student: p.student.clone(),
            roll_no: p.roll_no.clone(),
            balance_due: p.balance_due,
            days_overdue: parse_date(&p.last_payment)
                .map(|d| (as_of - d).num_days().max(0)),
        })
        .collect();

    FeeSummary {
        total_collected: payments.iter().map(|p| p.amount_paid).sum(),
        pending_balance: balance_with(PaymentStatus::Pending),
        overdue_balance: balance_with(PaymentStatus::Overdue),
        collected_this_month: payments
            .iter()
            .filter(|p| p.last_payment.starts_with(&month))
            .map(|p| p.amount_paid)
            .sum(),
        methods: method_totals
            .into_iter()
            .map(|(method, amount)| MethodShare {
                method,
                amount,
                percentage: rate_percent(amount, method_sum),
            })
            .collect(),
        overdue_alerts,
        collection: collection_report(payments),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStats {
    pub avg_minutes: Option<i64>,
    pub responses: u32,
}

/// Elapsed time between a message from someone else and `role`'s reply that
/// directly follows it. Pairs missing either timestamp, or out of order,
/// are skipped.
pub fn response_stats<'a>(
    conversations: impl IntoIterator<Item = &'a [MessageEntry]>,
    role: Role,
) -> ResponseStats {
    let mut total_ms: i64 = 0;
    let mut responses = 0u32;
    for messages in conversations {
        for pair in messages.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            if current.sender_role != role || previous.sender_role == role {
                continue;
            }
            let prev_ts = previous.timestamp.unwrap_or(0);
            let cur_ts = current.timestamp.unwrap_or(0);
            if prev_ts != 0 && cur_ts != 0 && cur_ts >= prev_ts {
                total_ms += cur_ts - prev_ts;
                responses += 1;
            }
        }
    }
    ResponseStats {
        avg_minutes: (responses > 0)
            .then(|| (total_ms as f64 / responses as f64 / 60_000.0).round() as i64),
        responses,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCounts {
    pub total: u32,
    pub threads: usize,
}

pub fn unread_counts<'a>(
    threads: impl IntoIterator<Item = &'a MessageThread>,
    role: Role,
) -> UnreadCounts {
    let mut out = UnreadCounts {
        total: 0,
        threads: 0,
    };
    for t in threads {
        let n = t.unread_for(role);
        out.total += n;
        if n > 0 {
            out.threads += 1;
        }
    }
    out
}
