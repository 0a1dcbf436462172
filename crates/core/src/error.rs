//! Error type shared by the functional core.
//!
//! Expected invalid input is never an error here: validators return
//! [`ValidationError`] values. `FormError` covers configuration mistakes
//! (unknown ids, duplicate registrations) and illegal session transitions.

use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Field defined twice: {0}")]
    DuplicateField(String),

    #[error("Template registered twice: {0}")]
    DuplicateTemplate(String),

    #[error("Field {0} is not a repeat group")]
    NotAGroup(String),

    #[error("Field {field} is not collected by step {step}")]
    FieldNotInStep { field: String, step: String },

    #[error("Field {field} expects {expected}")]
    WrongValueShape {
        field: String,
        expected: &'static str,
    },

    #[error("Session is complete; only the render request can be built")]
    SessionComplete,

    #[error("Session has not reached the final step")]
    NotComplete,

    #[error("Session data is invalid ({} violation(s))", .0.len())]
    Invalid(Vec<ValidationError>),
}
