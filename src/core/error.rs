use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("{field} must be {constraint}")]
    OutOfRange {
        field: &'static str,
        constraint: String,
    },

    #[error("deposit must be less than price")]
    DepositNotBelowPrice,

    #[error("{field} must contain at least one value")]
    EmptySweep { field: &'static str },

    #[error("{field} contains an invalid value: {value:?}")]
    InvalidList { field: &'static str, value: String },

    #[error("plan label {label:?} is used more than once")]
    DuplicateLabel { label: String },
}

impl ValidationError {
    pub(crate) fn out_of_range(field: &'static str, constraint: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            field,
            constraint: constraint.into(),
        }
    }

    /// Name of the input the error refers to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::NonFinite { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::EmptySweep { field }
            | ValidationError::InvalidList { field, .. } => field,
            ValidationError::DepositNotBelowPrice => "deposit",
            ValidationError::DuplicateLabel { .. } => "label",
        }
    }
}
