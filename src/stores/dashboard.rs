//! Read models assembled for the admin, teacher, parent and student home
//! screens.

use super::{
    assignments, attendance, classes, documents, events, messages, notifications, parents,
    profile, setup, students,
};
use crate::error::SchoolResult;
use crate::metrics::{self, ScoreTrend, SessionStats, Trend, UnreadCounts};
use crate::model::{Parent, Payment, PaymentStatus, ResultRow, Role, SchoolEvent, Student};
use crate::resolve;
use crate::store::Store;
use crate::stores::assignments::ASSIGNMENTS;
use crate::stores::attendance::ATTENDANCE;
use crate::stores::classes::ClassSummary;
use crate::stores::payments::PAYMENTS;
use crate::stores::results::RESULTS;
use crate::stores::students::STUDENTS;
use crate::stores::teachers::TEACHERS;
use chrono::NaiveDate;
use serde::Serialize;

const ADMIN_WINDOW_DAYS: i64 = 7;
const UPCOMING_EVENTS: usize = 3;
const UPCOMING_FEES: usize = 3;
const LATEST_RESULTS: usize = 3;
const STUDENT_UPCOMING_FEES: usize = 2;
const STUDENT_LATEST_RESULTS: usize = 2;
const RECENT_SESSIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCounts {
    pub students: usize,
    pub teachers: usize,
    pub parents: usize,
    pub classes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub counts: EntityCounts,
    pub collection_rate: i64,
    pub attendance: Trend,
    pub upcoming_events: Vec<SchoolEvent>,
    pub unread_notifications: usize,
}

pub fn admin(store: &mut Store, as_of: NaiveDate) -> AdminDashboard {
    let school_id = profile::school_id(store);
    let scope = school_id.as_deref();
    let all_students = STUDENTS.get(store);
    let students: Vec<Student> = resolve::scoped(&all_students, scope)
        .into_iter()
        .cloned()
        .collect();
    let teachers = TEACHERS.get(store);
    let parent_rows = parents::PARENTS.get(store);
    let marker = setup::attendance(store).absent_marker;
    let records = ATTENDANCE.get(store);

    AdminDashboard {
        counts: EntityCounts {
            students: students.len(),
            teachers: resolve::scoped(&teachers, scope).len(),
            parents: resolve::scoped(&parent_rows, scope).len(),
            classes: classes::CLASSES.get(store).len(),
        },
        collection_rate: metrics::overall_collection_rate(&PAYMENTS.get(store)),
        attendance: attendance::student_trend(
            &records,
            &students,
            as_of,
            ADMIN_WINDOW_DAYS,
            &marker,
        ),
        upcoming_events: events::upcoming(store, as_of, UPCOMING_EVENTS),
        unread_notifications: notifications::unread_count(store),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherDashboard {
    pub classes: Vec<ClassSummary>,
    /// Distinct students across all classes.
    pub roster_count: usize,
    pub attendance: Trend,
    pub window_days: i64,
    pub upcoming_events: Vec<SchoolEvent>,
    pub unread_messages: UnreadCounts,
    pub open_assignments: usize,
    pub new_assignments_this_week: usize,
}

pub fn teacher(store: &mut Store, as_of: NaiveDate) -> TeacherDashboard {
    let settings = setup::attendance(store);
    let days = settings.teacher_window_days;
    let class_rows = classes::CLASSES.get(store);
    let students = STUDENTS.get(store);
    let records = ATTENDANCE.get(store);
    let threads = messages::THREADS.get(store);
    let set_work = ASSIGNMENTS.get(store);

    TeacherDashboard {
        classes: classes::list(store),
        roster_count: resolve::students_in_classes(&students, &class_rows).len(),
        attendance: attendance::class_trend(
            &records,
            &class_rows,
            as_of,
            days,
            &settings.absent_marker,
        ),
        window_days: days,
        upcoming_events: events::upcoming(store, as_of, UPCOMING_EVENTS),
        unread_messages: metrics::unread_counts(
            resolve::threads_for_role(&threads, Role::Teacher),
            Role::Teacher,
        ),
        open_assignments: assignments::open_count(&set_work),
        new_assignments_this_week: assignments::created_this_week(&set_work, as_of),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentDashboard {
    pub parent: Parent,
    pub children: Vec<Student>,
    pub attendance: Trend,
    pub window_days: i64,
    pub outstanding_fees: f64,
    pub upcoming_fees: Vec<Payment>,
    pub latest_results: Vec<ResultRow>,
    pub unread_messages: UnreadCounts,
    pub unread_documents: usize,
    pub upcoming_events: Vec<SchoolEvent>,
}

/// Reconciles the parent's links first, so the dashboard never shows a
/// student that no longer exists.
pub fn parent(store: &mut Store, parent_id: i64, as_of: NaiveDate) -> SchoolResult<ParentDashboard> {
    let links = parents::children(store, parent_id)?;
    let parent = parents::get(store, parent_id)?;
    let settings = setup::attendance(store);
    let records = ATTENDANCE.get(store);
    let payments = PAYMENTS.get(store);
    let results = RESULTS.get(store);
    let threads = messages::THREADS.get(store);
    let unread_documents = documents::unread_count(store, Role::Parent)?;
    let children = links.students;

    let owed: Vec<&Payment> = resolve::rows_for_students(&payments, &children)
        .into_iter()
        .filter(|p| p.status != PaymentStatus::Paid)
        .collect();
    let mut latest: Vec<ResultRow> = resolve::rows_for_students(&results, &children)
        .into_iter()
        .cloned()
        .collect();
    latest.sort_by(|a, b| b.id.cmp(&a.id));
    latest.truncate(LATEST_RESULTS);

    Ok(ParentDashboard {
        attendance: attendance::student_trend(
            &records,
            &children,
            as_of,
            settings.parent_window_days,
            &settings.absent_marker,
        ),
        window_days: settings.parent_window_days,
        outstanding_fees: owed.iter().map(|p| p.balance_due).sum(),
        upcoming_fees: owed.iter().take(UPCOMING_FEES).map(|p| (*p).clone()).collect(),
        latest_results: latest,
        unread_messages: metrics::unread_counts(
            resolve::threads_for_role(&threads, Role::Parent),
            Role::Parent,
        ),
        unread_documents,
        upcoming_events: events::upcoming(store, as_of, UPCOMING_EVENTS),
        children,
        parent,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSession {
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub student: Student,
    pub attendance: SessionStats,
    pub recent_attendance: Vec<RecentSession>,
    pub scores: ScoreTrend,
    pub latest_results: Vec<ResultRow>,
    pub outstanding_fees: f64,
    /// This month's outstanding balance minus last month's.
    pub outstanding_delta: f64,
    pub payment_count: usize,
    pub upcoming_fees: Vec<Payment>,
    pub unread_messages: UnreadCounts,
    pub unread_documents: usize,
    pub upcoming_events: Vec<SchoolEvent>,
}

/// Attendance here counts every recorded session, not a dated window.
pub fn student(store: &mut Store, student_id: i64, as_of: NaiveDate) -> SchoolResult<StudentDashboard> {
    let student = students::get(store, student_id)?;
    let marker = setup::attendance(store).absent_marker;
    let records = ATTENDANCE.get(store);
    let payments = PAYMENTS.get(store);
    let results = RESULTS.get(store);
    let threads = messages::THREADS.get(store);
    let unread_documents = documents::unread_count(store, Role::Student)?;

    let sessions = metrics::student_sessions(&records, &student);
    let recent_attendance = sessions
        .iter()
        .take(RECENT_SESSIONS)
        .map(|r| RecentSession {
            date_iso: r.date_iso.clone(),
            status: r.attendance.get(&student.id).cloned().unwrap_or_default(),
        })
        .collect();

    let own = std::slice::from_ref(&student);
    let mine: Vec<&ResultRow> = resolve::rows_for_students(&results, own);
    let mut latest: Vec<ResultRow> = mine.iter().map(|r| (*r).clone()).collect();
    latest.sort_by(|a, b| b.id.cmp(&a.id));
    latest.truncate(STUDENT_LATEST_RESULTS);

    let fees: Vec<&Payment> = resolve::rows_for_students(&payments, own);
    let mut unpaid: Vec<Payment> = fees
        .iter()
        .filter(|p| p.status != PaymentStatus::Paid)
        .map(|p| (*p).clone())
        .collect();
    unpaid.sort_by(|a, b| a.last_payment.cmp(&b.last_payment));
    unpaid.truncate(STUDENT_UPCOMING_FEES);

    Ok(StudentDashboard {
        attendance: metrics::session_stats(&sessions, student.id, &marker),
        recent_attendance,
        scores: metrics::score_trend(&mine),
        latest_results: latest,
        outstanding_fees: fees.iter().map(|p| p.balance_due).sum(),
        outstanding_delta: metrics::outstanding_month_delta(&fees, as_of),
        payment_count: fees.len(),
        upcoming_fees: unpaid,
        unread_messages: metrics::unread_counts(
            resolve::threads_for_role(&threads, Role::Student),
            Role::Student,
        ),
        unread_documents,
        upcoming_events: events::upcoming(store, as_of, UPCOMING_EVENTS),
        student,
    })
}
