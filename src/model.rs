use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Parent,
    Student,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Teacher, Role::Parent, Role::Student];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "parent" => Some(Role::Parent),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Role::Admin => "School Admin",
            Role::Teacher => "Teacher",
            Role::Parent => "Parent",
            Role::Student => "Student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
    Pending,
    Graduated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    #[serde(default)]
    pub student_id: String,
    pub roll_number: String,
    pub name: String,
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: i64,
    pub emp_id: String,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssignmentStatus {
    #[default]
    Open,
    Closed,
}

/// Set by a teacher for one class. `submissions` never exceeds `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub class_id: i64,
    pub title: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub status: AssignmentStatus,
    #[serde(default)]
    pub submissions: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: String,
}

/// One class is one grade + section + subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherClass {
    pub id: i64,
    pub grade: String,
    pub section: String,
    pub subject: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentChild {
    pub name: String,
    pub student_id: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parent {
    pub id: i64,
    pub parent_id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default)]
    pub linked_student_ids: Vec<i64>,
    #[serde(default)]
    pub children: Vec<ParentChild>,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Overdue,
    Paid,
}

impl PaymentStatus {
    pub fn next(self) -> Self {
        match self {
            PaymentStatus::Pending => PaymentStatus::Overdue,
            PaymentStatus::Overdue => PaymentStatus::Paid,
            PaymentStatus::Paid => PaymentStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    /// Numeric key of the owning student. Records written before the key
    /// existed carry only `roll_no`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<i64>,
    pub student: String,
    pub roll_no: String,
    pub grade: String,
    pub section: String,
    pub total_fees: f64,
    pub amount_paid: f64,
    pub balance_due: f64,
    pub status: PaymentStatus,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub last_payment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<i64>,
    pub roll_no: String,
    pub name: String,
    pub class_grade: String,
    pub section: String,
    pub math: f64,
    pub english: f64,
    pub science: f64,
    pub history: f64,
    pub total: f64,
    pub percentage: f64,
    pub grade: String,
    #[serde(default)]
    pub remarks: String,
}

/// One roll call for a grade + section on a date. `attendance` maps student
/// id to the recorded status string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    #[serde(rename = "dateISO")]
    pub date_iso: String,
    pub grade: String,
    pub section: String,
    pub present: u32,
    pub absent: u32,
    #[serde(default)]
    pub attendance: BTreeMap<i64, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolEvent {
    pub id: i64,
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub attendees: u32,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub organizer: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[default]
    Draft,
    #[serde(rename = "In Review")]
    InReview,
    Approved,
    #[serde(rename = "Expiring Soon")]
    ExpiringSoon,
}

impl DocumentStatus {
    /// Opening a document moves it one step along its review path.
    pub fn on_open(self) -> Self {
        match self {
            DocumentStatus::Draft => DocumentStatus::InReview,
            DocumentStatus::InReview | DocumentStatus::ExpiringSoon | DocumentStatus::Approved => {
                DocumentStatus::Approved
            }
        }
    }
}

/// Per-reader state of a document. Anything never marked is unread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadState {
    Read,
    #[default]
    Unread,
}

impl ReadState {
    pub fn toggled(self) -> Self {
        match self {
            ReadState::Read => ReadState::Unread,
            ReadState::Unread => ReadState::Read,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub name: String,
    pub category: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub owner: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadParticipant {
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageThread {
    pub id: i64,
    pub participants: Vec<ThreadParticipant>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub unread_by: BTreeMap<Role, u32>,
}

impl MessageThread {
    pub fn unread_for(&self, role: Role) -> u32 {
        self.unread_by.get(&role).copied().unwrap_or(0)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.participants.iter().any(|p| p.role == role)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    pub sender_role: Role,
    pub sender_name: String,
    pub message: String,
    #[serde(default)]
    pub time: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationType {
    Alert,
    Announcement,
    Reminder,
    #[default]
    Update,
}

impl NotificationType {
    pub fn icon_key(self) -> &'static str {
        match self {
            NotificationType::Alert => "alert",
            NotificationType::Announcement => "megaphone",
            NotificationType::Reminder => "calendar",
            NotificationType::Update => "check",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationStatus {
    #[default]
    Unread,
    Read,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub time: String,
    pub channel: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub status: NotificationStatus,
    pub icon_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub school_id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub classes_offered: Vec<String>,
}

/// Issued by the authentication component; only read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub role: Role,
    pub name: String,
    #[serde(default)]
    pub email: String,
}
