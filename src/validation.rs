use chrono::DateTime;
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

/// A strict type that is only ever built from its raw, validated counterpart.
pub trait FromValidate {
    type Validatable: Validate + for<'de> Deserialize<'de>;

    fn from(value: Self::Validatable) -> Self;
}

/// Deserializes the raw form, validates it and converts it.
pub fn from_value<T: FromValidate>(value: serde_json::Value) -> Result<T, ValidateError> {
    let raw: T::Validatable = serde_json::from_value(value).map_err(ValidateError::Parse)?;
    raw.validate().map_err(ValidateError::Invalid)?;
    Ok(<T as FromValidate>::from(raw))
}

#[derive(Debug)]
pub enum ValidateError {
    Parse(serde_json::Error),
    Invalid(ValidationErrors),
}

pub fn rfc3339(value: &str) -> Result<(), ValidationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("rfc3339"))
}

pub fn single_error(field: &'static str, code: &'static str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new(code));
    errors
}
