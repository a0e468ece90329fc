use super::setup;
use crate::error::{SchoolError, SchoolResult};
use crate::ids;
use crate::metrics::{self, FeeSummary};
use crate::model::{Payment, PaymentStatus, Student};
use crate::resolve::RollIndex;
use crate::store::{PersistedCell, Store};
use crate::stores::students::STUDENTS;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

pub const PAYMENTS: PersistedCell<Vec<Payment>> = PersistedCell::new("school.payments", Vec::new);

/// `amountPaid` is capped at `totalFees` (and equals it once paid);
/// `balanceDue` never goes negative.
pub fn normalize_amounts(p: &mut Payment) {
    p.total_fees = p.total_fees.max(0.0);
    p.amount_paid = if p.status == PaymentStatus::Paid {
        p.total_fees
    } else {
        p.amount_paid.clamp(0.0, p.total_fees)
    };
    p.balance_due = (p.total_fees - p.amount_paid).max(0.0);
}

/// Moves to the next status. Returning to `Pending` resets the paid amount
/// to `reset_paid_percent` of the total.
pub fn advance_status(p: &mut Payment, reset_paid_percent: i64) {
    p.status = p.status.next();
    match p.status {
        PaymentStatus::Overdue => {}
        PaymentStatus::Paid => p.amount_paid = p.total_fees,
        PaymentStatus::Pending => {
            p.amount_paid = (p.total_fees * reset_paid_percent as f64 / 100.0).round();
        }
    }
    normalize_amounts(p);
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFilter {
    pub year: Option<String>,
    pub term: Option<String>,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub status: Option<PaymentStatus>,
    pub search: Option<String>,
    pub student_id: Option<i64>,
}

impl PaymentFilter {
    pub fn matches(&self, p: &Payment) -> bool {
        let eq = |want: &Option<String>, have: &str| want.as_deref().map(|w| w == have).unwrap_or(true);
        let search = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        eq(&self.year, &p.year)
            && eq(&self.term, &p.term)
            && eq(&self.grade, &p.grade)
            && eq(&self.section, &p.section)
            && self.status.map(|s| s == p.status).unwrap_or(true)
            && self.student_id.map(|id| p.student_id == Some(id)).unwrap_or(true)
            && search
                .map(|s| p.student.to_lowercase().contains(&s) || p.roll_no.to_lowercase().contains(&s))
                .unwrap_or(true)
    }
}

pub fn list(store: &mut Store, filter: &PaymentFilter) -> Vec<Payment> {
    PAYMENTS
        .get(store)
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub roll_no: Option<String>,
    pub total_fees: f64,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub last_payment: Option<String>,
}

/// The owning student by id, or through the roll index.
fn owning_student(
    students: &[Student],
    student_id: Option<i64>,
    roll_no: Option<&str>,
) -> SchoolResult<Student> {
    let id = match (student_id, roll_no.map(str::trim).filter(|r| !r.is_empty())) {
        (Some(id), _) => Some(id),
        (None, Some(roll)) => RollIndex::build(students).lookup(roll),
        (None, None) => {
            return Err(SchoolError::validation("studentId or rollNo is required"));
        }
    };
    id.and_then(|id| students.iter().find(|s| s.id == id))
        .cloned()
        .ok_or_else(|| SchoolError::validation("Select a registered student to record payments."))
}

pub fn create(store: &mut Store, input: NewPayment, as_of: NaiveDate) -> SchoolResult<Payment> {
    if !input.total_fees.is_finite() || input.total_fees < 0.0 {
        return Err(SchoolError::validation("totalFees must be a non-negative number"));
    }
    let students = STUDENTS.get(store);
    let student = owning_student(&students, input.student_id, input.roll_no.as_deref())?;

    let payment = PAYMENTS.update(store, |payments| {
        let mut p = Payment {
            id: ids::next_id(payments.iter().map(|p| p.id)),
            student_id: Some(student.id),
            student: student.name.clone(),
            roll_no: student.roll_number.clone(),
            grade: student.grade.clone(),
            section: student.section.clone(),
            total_fees: input.total_fees,
            amount_paid: input.amount_paid,
            balance_due: 0.0,
            status: input.status,
            year: input.year.trim().to_string(),
            term: input.term.trim().to_string(),
            method: input.method.trim().to_string(),
            last_payment: input
                .last_payment
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| as_of.format("%Y-%m-%d").to_string()),
        };
        normalize_amounts(&mut p);
        payments.push(p.clone());
        p
    });
    info!(id = payment.id, student_id = student.id, "payment created");
    Ok(payment)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PaymentPatch {
    pub total_fees: Option<f64>,
    pub amount_paid: Option<f64>,
    pub status: Option<PaymentStatus>,
    pub year: Option<String>,
    pub term: Option<String>,
    pub method: Option<String>,
    pub last_payment: Option<String>,
}

fn modify<R>(
    store: &mut Store,
    id: i64,
    f: impl FnOnce(&mut Payment) -> SchoolResult<R>,
) -> SchoolResult<R> {
    PAYMENTS.try_update(store, |payments| {
        let p = payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| SchoolError::not_found("payment", id))?;
        f(p)
    })
}

pub fn update(store: &mut Store, id: i64, patch: PaymentPatch) -> SchoolResult<Payment> {
    let payment = modify(store, id, |p| {
        if let Some(total) = patch.total_fees {
            if !total.is_finite() || total < 0.0 {
                return Err(SchoolError::validation("totalFees must be a non-negative number"));
            }
            p.total_fees = total;
        }
        if let Some(v) = patch.amount_paid {
            p.amount_paid = v;
        }
        if let Some(v) = patch.status {
            p.status = v;
        }
        if let Some(v) = patch.year {
            p.year = v.trim().to_string();
        }
        if let Some(v) = patch.term {
            p.term = v.trim().to_string();
        }
        if let Some(v) = patch.method {
            p.method = v.trim().to_string();
        }
        if let Some(v) = patch.last_payment {
            p.last_payment = v.trim().to_string();
        }
        normalize_amounts(p);
        Ok(p.clone())
    })?;
    info!(id, "payment updated");
    Ok(payment)
}

pub fn cycle_status(store: &mut Store, id: i64) -> SchoolResult<Payment> {
    let reset = setup::fees(store).reset_paid_percent;
    let payment = modify(store, id, |p| {
        advance_status(p, reset);
        Ok(p.clone())
    })?;
    info!(id, status = ?payment.status, "payment status cycled");
    Ok(payment)
}

/// Marks the payment paid in full.
pub fn record(store: &mut Store, id: i64, as_of: NaiveDate) -> SchoolResult<Payment> {
    let payment = modify(store, id, |p| {
        p.status = PaymentStatus::Paid;
        p.last_payment = as_of.format("%Y-%m-%d").to_string();
        normalize_amounts(p);
        Ok(p.clone())
    })?;
    info!(id, "payment recorded");
    Ok(payment)
}

pub fn delete(store: &mut Store, id: i64) -> SchoolResult<Payment> {
    let removed = PAYMENTS.try_update(store, |payments| {
        let idx = payments
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| SchoolError::not_found("payment", id))?;
        Ok::<_, SchoolError>(payments.remove(idx))
    })?;
    info!(id, "payment deleted");
    Ok(removed)
}

pub fn summary(store: &mut Store, filter: &PaymentFilter, as_of: NaiveDate) -> FeeSummary {
    let rows = list(store, filter);
    let refs: Vec<&Payment> = rows.iter().collect();
    metrics::fee_summary(&refs, as_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::students::{self, StudentRegistration};
    use crate::stores::testutil::store;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).expect("date")
    }

    fn seeded() -> Store {
        let mut s = store();
        students::register(
            &mut s,
            StudentRegistration {
                roll_number: Some("2024001".into()),
                grade: Some("Grade 9".into()),
                section: Some("A".into()),
                ..Default::default()
            },
        )
        .expect("student");
        s
    }

    #[test]
    fn status_cycle_adjusts_amounts() {
        let mut s = seeded();
        let p = create(
            &mut s,
            NewPayment {
                roll_no: Some("2024001".into()),
                total_fees: 1000.0,
                amount_paid: 400.0,
                ..Default::default()
            },
            as_of(),
        )
        .expect("create");
        assert_eq!(p.balance_due, 600.0);
        assert_eq!(p.student_id, Some(1));
        assert_eq!(p.status, PaymentStatus::Pending);

        let p = cycle_status(&mut s, p.id).expect("overdue");
        assert_eq!((p.status, p.amount_paid, p.balance_due), (PaymentStatus::Overdue, 400.0, 600.0));
        let p = cycle_status(&mut s, p.id).expect("paid");
        assert_eq!((p.status, p.amount_paid, p.balance_due), (PaymentStatus::Paid, 1000.0, 0.0));
        let p = cycle_status(&mut s, p.id).expect("pending");
        assert_eq!((p.status, p.amount_paid, p.balance_due), (PaymentStatus::Pending, 500.0, 500.0));
    }

    #[test]
    fn amounts_are_clamped() {
        let mut p = Payment {
            id: 1,
            student_id: None,
            student: String::new(),
            roll_no: String::new(),
            grade: String::new(),
            section: String::new(),
            total_fees: 300.0,
            amount_paid: 450.0,
            balance_due: 0.0,
            status: PaymentStatus::Overdue,
            year: String::new(),
            term: String::new(),
            method: String::new(),
            last_payment: String::new(),
        };
        normalize_amounts(&mut p);
        assert_eq!((p.amount_paid, p.balance_due), (300.0, 0.0));
        advance_status(&mut p, 25);
        advance_status(&mut p, 25);
        assert_eq!((p.status, p.amount_paid, p.balance_due), (PaymentStatus::Pending, 75.0, 225.0));
    }

    #[test]
    fn unknown_student_is_rejected_without_write() {
        let mut s = seeded();
        let err = create(
            &mut s,
            NewPayment {
                roll_no: Some("2024999".into()),
                total_fees: 10.0,
                ..Default::default()
            },
            as_of(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_params");
        assert!(list(&mut s, &PaymentFilter::default()).is_empty());
    }

    #[test]
    fn record_marks_paid_and_filters_apply() {
        let mut s = seeded();
        let p = create(
            &mut s,
            NewPayment {
                student_id: Some(1),
                total_fees: 200.0,
                year: "2025-2026".into(),
                ..Default::default()
            },
            as_of(),
        )
        .expect("create");
        let p = record(&mut s, p.id, as_of()).expect("record");
        assert_eq!((p.status, p.balance_due), (PaymentStatus::Paid, 0.0));

        let filter = PaymentFilter {
            status: Some(PaymentStatus::Paid),
            search: Some("2024".into()),
            ..Default::default()
        };
        assert_eq!(list(&mut s, &filter).len(), 1);
        let filter = PaymentFilter {
            year: Some("2024-2025".into()),
            ..Default::default()
        };
        assert!(list(&mut s, &filter).is_empty());
        assert_eq!(summary(&mut s, &PaymentFilter::default(), as_of()).total_collected, 200.0);
    }
}
