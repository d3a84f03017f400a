use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::error::ApiError;

/// Ten years.
pub const MAX_EXPIRY_HOURS: i64 = 24 * 365 * 10;

/// Collects per-field messages and turns them into a 400.
#[derive(Default)]
pub struct Validator {
    errors: BTreeMap<&'static str, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, field: &'static str, message: String) {
        // Keep the first message per field.
        self.errors.entry(field).or_insert(message);
    }

    pub fn length(&mut self, field: &'static str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        if len == 0 {
            self.fail(field, "cannot be empty".to_string());
        } else if len < min {
            self.fail(field, format!("should have at least {} characters", min));
        } else if len > max {
            self.fail(field, format!("should have at most {} characters", max));
        }
        self
    }

    pub fn optional_length(&mut self, field: &'static str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(value) = value {
            if value.chars().count() > max {
                self.fail(field, format!("should have at most {} characters", max));
            }
        }
        self
    }

    /// Letters, digits, `-` and `_` only.
    pub fn identifier(&mut self, field: &'static str, value: &str) -> &mut Self {
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            self.fail(field, "should only contain letters, numbers, dashes and underscores".to_string());
        }
        self
    }

    pub fn email(&mut self, field: &'static str, value: &str) -> &mut Self {
        let valid = match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !value.contains(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            self.fail(field, "should be a valid email".to_string());
        }
        self
    }

    pub fn password(&mut self, field: &'static str, value: &str) -> &mut Self {
        self.length(field, value, 8, 30);
        let has_letter = value.chars().any(|c| c.is_alphabetic());
        let has_digit = value.chars().any(|c| c.is_ascii_digit());
        if !(has_letter && has_digit) {
            self.fail(field, "should contain letters and digits".to_string());
        }
        self
    }

    pub fn positive(&mut self, field: &'static str, value: Option<i64>) -> &mut Self {
        if value.is_some_and(|v| v <= 0) {
            self.fail(field, "should be greater than 0".to_string());
        }
        self
    }

    /// A positive number of hours no larger than [`MAX_EXPIRY_HOURS`].
    pub fn expiry_hours(&mut self, field: &'static str, value: Option<i64>) -> &mut Self {
        self.positive(field, value);
        if value.is_some_and(|v| v > MAX_EXPIRY_HOURS) {
            self.fail(field, format!("should be at most {} hours", MAX_EXPIRY_HOURS));
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(ApiError::Validation(std::mem::take(&mut self.errors)))
    }
}

/// Build a 400 carrying a single field message.
pub fn field_error(field: &'static str, message: &str) -> ApiError {
    ApiError::Validation(BTreeMap::from([(field, message.to_string())]))
}

/// `now` plus `hours`, or a 400 on `field` when the date is out of range.
pub fn expires_at(field: &'static str, now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>, ApiError> {
    Duration::try_hours(hours)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| field_error(field, "is out of range"))
}
