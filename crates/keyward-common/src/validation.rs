//! Input validation utilities.
//!
//! Login and registration forms are checked here before they are sent, so a
//! malformed email never costs a round-trip.

use validator::Validate;

use crate::error::KeywardError;

/// Validate a request body, returning a KeywardError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), KeywardError> {
    body.validate().map_err(|e| KeywardError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}
