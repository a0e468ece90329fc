use serde_json::json;
use thiserror::Error;

/// Failures a caller can act on. Each variant maps to a stable wire code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchoolError {
    #[error("{0}")]
    Validation(String),
    #[error("That {field} is already registered.")]
    Duplicate { field: &'static str, value: String },
    #[error("We could not find these student IDs for the selected school: {}", .ids.join(", "))]
    MissingReference { ids: Vec<String> },
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("no active session")]
    NoSession,
}

impl SchoolError {
    pub fn validation(message: impl Into<String>) -> Self {
        SchoolError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SchoolError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SchoolError::Validation(_) => "bad_params",
            SchoolError::Duplicate { .. } => "duplicate",
            SchoolError::MissingReference { .. } => "missing_reference",
            SchoolError::NotFound { .. } => "not_found",
            SchoolError::NoSession => "no_session",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            SchoolError::Duplicate { field, value } => Some(json!({ "field": field, "value": value })),
            SchoolError::MissingReference { ids } => Some(json!({ "ids": ids })),
            SchoolError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            SchoolError::Validation(_) | SchoolError::NoSession => None,
        }
    }
}

pub type SchoolResult<T> = Result<T, SchoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reference_lists_every_identifier() {
        let e = SchoolError::MissingReference {
            ids: vec!["2024099".into(), "STD-0042".into()],
        };
        assert_eq!(
            e.to_string(),
            "We could not find these student IDs for the selected school: 2024099, STD-0042"
        );
        assert_eq!(e.code(), "missing_reference");
        assert_eq!(e.details(), Some(json!({ "ids": ["2024099", "STD-0042"] })));
    }

    #[test]
    fn duplicate_roll_number_message() {
        let e = SchoolError::Duplicate {
            field: "roll number",
            value: "2024001".into(),
        };
        assert_eq!(e.to_string(), "That roll number is already registered.");
        assert_eq!(e.code(), "duplicate");
    }
}
