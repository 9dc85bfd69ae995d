//! Validation Utilities

use validator::{Validate, ValidationError, ValidationErrors};

use super::error::{AppError, FieldError};

/// Flatten validator errors into field errors.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let message = field_errors(&errors)
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation(message)
}

/// Validate a request body, mapping failures to `AppError::Validation`.
pub fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(validation_error)
}

/// Usernames: lowercase ascii letters, digits and underscores.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ValidationError::new("username_length")
            .with_message("Username must be 3-32 characters".into()));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::new("username_charset")
            .with_message("Username may only contain a-z, 0-9 and _".into()));
    }
    Ok(())
}

/// Community slugs: lowercase ascii letters, digits and single dashes.
pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if !(3..=48).contains(&len) {
        return Err(ValidationError::new("slug_length")
            .with_message("Slug must be 3-48 characters".into()));
    }
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || value.starts_with('-') || value.ends_with('-') || value.contains("--") {
        return Err(ValidationError::new("slug_charset")
            .with_message("Slug may only contain a-z, 0-9 and single dashes".into()));
    }
    Ok(())
}

/// Reject strings that are empty after trimming.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Must not be blank".into()));
    }
    Ok(())
}
