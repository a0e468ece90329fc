use crate::error::{SchoolError, SchoolResult};
use std::collections::HashSet;

pub const STUDENT_CODE_PREFIX: &str = "STD";
pub const PARENT_CODE_PREFIX: &str = "PAR";
pub const EMPLOYEE_CODE_PREFIX: &str = "EMP";

/// max(existing) + 1, or 1 for an empty collection. Saturates at `i64::MAX`.
pub fn next_id(existing: impl IntoIterator<Item = i64>) -> i64 {
    existing
        .into_iter()
        .max()
        .map(|m| m.saturating_add(1))
        .unwrap_or(1)
        .max(1)
}

/// `STD-0001` style codes.
pub fn format_code(prefix: &str, n: i64, width: usize) -> String {
    format!("{}-{:0width$}", prefix, n, width = width)
}

pub fn student_code(id: i64) -> String {
    format_code(STUDENT_CODE_PREFIX, id, 4)
}

pub fn parent_code(id: i64) -> String {
    format_code(PARENT_CODE_PREFIX, id, 4)
}

pub fn employee_code(id: i64) -> String {
    format_code(EMPLOYEE_CODE_PREFIX, id, 3)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollPolicy {
    pub prefix: String,
    pub counter_width: usize,
}

impl Default for RollPolicy {
    fn default() -> Self {
        Self {
            prefix: "2024".to_string(),
            counter_width: 3,
        }
    }
}

impl RollPolicy {
    pub fn format(&self, counter: i64) -> String {
        format!(
            "{}{:0width$}",
            self.prefix,
            counter,
            width = self.counter_width
        )
    }
}

/// Picks the roll number for a new or edited student.
///
/// A non-empty `candidate` is kept verbatim unless another student already
/// holds it (compared case-insensitively). Without one, numbers are tried
/// from `start` upwards until a free one turns up. `existing` must not
/// contain the roll of the student being edited.
pub fn allocate_roll_number<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    candidate: Option<&str>,
    start: i64,
    policy: &RollPolicy,
) -> SchoolResult<String> {
    let taken: HashSet<String> = existing
        .into_iter()
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
        .collect();

    if let Some(raw) = candidate.map(str::trim).filter(|c| !c.is_empty()) {
        if taken.contains(&raw.to_lowercase()) {
            return Err(SchoolError::Duplicate {
                field: "roll number",
                value: raw.to_string(),
            });
        }
        return Ok(raw.to_string());
    }

    // Terminates: `taken` is finite and every counter yields a distinct string.
    let mut counter = start.max(1);
    loop {
        let roll = policy.format(counter);
        if !taken.contains(&roll.to_lowercase()) {
            return Ok(roll);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_id_is_max_plus_one() {
        assert_eq!(next_id(Vec::<i64>::new()), 1);
        assert_eq!(next_id([3, 9, 4]), 10);
    }

    #[test]
    fn next_id_saturates_instead_of_overflowing() {
        assert_eq!(next_id([i64::MAX]), i64::MAX);
        assert_eq!(next_id([-5, i64::MAX - 1]), i64::MAX);
        assert_eq!(next_id([-5]), 1);
    }

    #[test]
    fn codes_are_zero_padded() {
        assert_eq!(student_code(1), "STD-0001");
        assert_eq!(parent_code(42), "PAR-0042");
        assert_eq!(employee_code(7), "EMP-007");
        assert_eq!(student_code(12345), "STD-12345");
    }

    #[test]
    fn fallback_skips_every_taken_roll() {
        let existing: Vec<String> = (1..=10).map(|n| format!("2024{:03}", n)).collect();
        let roll = allocate_roll_number(
            existing.iter().map(String::as_str),
            None,
            1,
            &RollPolicy::default(),
        )
        .expect("allocate");
        assert_eq!(roll, "2024011");
        assert!(!existing.contains(&roll));
    }

    #[test]
    fn fallback_starts_at_the_new_id() {
        let roll =
            allocate_roll_number(["2024001"], None, 11, &RollPolicy::default()).expect("allocate");
        assert_eq!(roll, "2024011");
    }

    #[test]
    fn explicit_candidate_is_case_insensitively_unique() {
        let err = allocate_roll_number(["ab-17"], Some(" AB-17 "), 2, &RollPolicy::default())
            .unwrap_err();
        assert_eq!(err.code(), "duplicate");

        let ok = allocate_roll_number(["ab-17"], Some("AB-18"), 2, &RollPolicy::default())
            .expect("free candidate");
        assert_eq!(ok, "AB-18");
    }

    #[test]
    fn blank_candidate_falls_back() {
        let roll = allocate_roll_number(Vec::<&str>::new(), Some("   "), 4, &RollPolicy::default())
            .expect("allocate");
        assert_eq!(roll, "2024004");
    }

    #[test]
    fn custom_prefix_and_width() {
        let policy = RollPolicy {
            prefix: "25-".into(),
            counter_width: 5,
        };
        assert_eq!(policy.format(12), "25-00012");
    }
}
